//! FetchCycle - camera to staging transfer
//!
//! ## Responsibilities
//!
//! - One camera session per run
//! - List locked files, oldest name first
//! - For each file: download -> store -> delete on the camera
//!
//! A file is only deleted on the camera after the staging store accepted
//! it (or reported it as older than the acceptance marker).
//!
//! ## Failure policy
//!
//! `Abort` (default) stops at the first failing file and returns its error.
//! `Continue` logs the failure and moves on, like the upload cycle.

use crate::camera::{CameraController, CameraSession, RemoteVideoFile};
use crate::error::{Error, Result};
use crate::file_storage::{StagingStore, StoreOutcome};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

/// What to do when one file fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    #[default]
    Abort,
    Continue,
}

impl FromStr for FetchFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(Error::Config(format!(
                "Unknown fetch failure policy '{}' (expected abort|continue)",
                other
            ))),
        }
    }
}

/// Outcome of one fetch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub listed: usize,
    pub stored: usize,
    pub skipped_stale: usize,
    pub failed: usize,
}

/// Camera to staging transfer
pub struct FetchCycle {
    session: Arc<CameraSession>,
    store: Arc<StagingStore>,
    policy: FetchFailurePolicy,
}

impl FetchCycle {
    pub fn new(
        session: Arc<CameraSession>,
        store: Arc<StagingStore>,
        policy: FetchFailurePolicy,
    ) -> Self {
        Self {
            session,
            store,
            policy,
        }
    }

    /// Run one full camera sync
    pub async fn run(&self) -> Result<FetchReport> {
        let report = self
            .session
            .connect(|camera| async move { self.transfer_all(&camera).await })
            .await?;

        tracing::info!(
            listed = report.listed,
            stored = report.stored,
            skipped_stale = report.skipped_stale,
            failed = report.failed,
            "Fetch cycle completed"
        );
        Ok(report)
    }

    async fn transfer_all(&self, camera: &CameraController) -> Result<FetchReport> {
        let mut files = camera.list_locked_files().await?;
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let mut report = FetchReport {
            listed: files.len(),
            ..Default::default()
        };

        tracing::debug!(count = files.len(), "Listed locked camera files");

        for file in &files {
            match self.transfer_one(camera, file).await {
                Ok(StoreOutcome::Stored) => report.stored += 1,
                Ok(StoreOutcome::SkippedStale) => report.skipped_stale += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        path = %file.path,
                        error = %e,
                        "Error fetching video"
                    );
                    if self.policy == FetchFailurePolicy::Abort {
                        return Err(e);
                    }
                }
            }
        }

        Ok(report)
    }

    async fn transfer_one(
        &self,
        camera: &CameraController,
        file: &RemoteVideoFile,
    ) -> Result<StoreOutcome> {
        let outcome = self
            .store
            .store(&file.name, || async { Ok(camera.fetch(file).await?.stream) })
            .await?;

        camera.delete_remote(file).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_str() {
        assert_eq!("abort".parse::<FetchFailurePolicy>().unwrap(), FetchFailurePolicy::Abort);
        assert_eq!(
            " Continue ".parse::<FetchFailurePolicy>().unwrap(),
            FetchFailurePolicy::Continue
        );
        assert!(matches!(
            "skip".parse::<FetchFailurePolicy>(),
            Err(Error::Config(_))
        ));
        assert_eq!(FetchFailurePolicy::default(), FetchFailurePolicy::Abort);
    }
}
