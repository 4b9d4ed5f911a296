//! UploadCycle - staging to cloud transfer
//!
//! Each staged file goes through exists -> upload -> delete on its own;
//! a failure is logged and counted and never stops its siblings. Local
//! copies are only deleted after the cloud confirmed the object.

use super::types::{FileSync, UploadReport};
use crate::cloud::CloudUploader;
use crate::error::Result;
use crate::file_storage::{StagedVideoFile, StagingStore};
use crate::models::mimetype_for;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Staging to cloud transfer
pub struct UploadCycle {
    store: Arc<StagingStore>,
    cloud: Arc<dyn CloudUploader>,
    /// Files processed in parallel (1 = sequential)
    concurrency: usize,
}

impl UploadCycle {
    pub fn new(store: Arc<StagingStore>, cloud: Arc<dyn CloudUploader>, concurrency: usize) -> Self {
        Self {
            store,
            cloud,
            concurrency: concurrency.max(1),
        }
    }

    /// Push every staged file; fails only if the staging listing fails
    pub async fn run(&self) -> Result<UploadReport> {
        let files = self.store.list().await?;
        if files.is_empty() {
            tracing::debug!("No staged videos");
            return Ok(UploadReport::default());
        }

        tracing::debug!(
            count = files.len(),
            concurrency = self.concurrency,
            "Starting upload cycle"
        );

        let results: Vec<Result<FileSync>> = stream::iter(files)
            .map(|file| async move {
                let result = self.sync_file(&file).await;
                if let Err(e) = &result {
                    tracing::error!(
                        filename = %file.name,
                        error = %e,
                        "Error uploading video"
                    );
                }
                result
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = UploadReport::default();
        for result in results {
            match result {
                Ok(FileSync::Uploaded) => report.uploaded += 1,
                Ok(FileSync::AlreadyPresent) => report.already_present += 1,
                Err(_) => report.failed += 1,
            }
        }

        tracing::info!(
            uploaded = report.uploaded,
            already_present = report.already_present,
            failed = report.failed,
            "Upload cycle completed"
        );
        Ok(report)
    }

    async fn sync_file(&self, file: &StagedVideoFile) -> Result<FileSync> {
        let outcome = if self.cloud.exists(&file.name).await? {
            tracing::debug!(filename = %file.name, "Video already exists");
            FileSync::AlreadyPresent
        } else {
            let size = file.size().await?;
            tracing::debug!(filename = %file.name, size = size, "Uploading video");

            let stream = self.store.open_stream(&file.name).await?;
            self.cloud
                .upload(&file.name, stream, mimetype_for(&file.name))
                .await?;

            tracing::info!(filename = %file.name, "Uploaded video");
            FileSync::Uploaded
        };

        self.store.delete(&file.name).await?;
        Ok(outcome)
    }
}
