//! Staging store types

use crate::error::{Error, Result};
use serde::Serialize;
use std::path::PathBuf;

/// Result of a store attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOutcome {
    /// Bytes written and acceptance marker advanced
    Stored,
    /// Name sorts before the acceptance marker; nothing written
    SkippedStale,
}

/// A video file held in the staging directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedVideoFile {
    /// Absolute path on local disk
    pub path: PathBuf,
    /// File name, identity within the store
    pub name: String,
}

impl StagedVideoFile {
    /// Size on disk, read on demand
    pub async fn size(&self) -> Result<u64> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(self.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn info(&self) -> Result<StagedFileInfo> {
        Ok(StagedFileInfo {
            name: self.name.clone(),
            path: self.path.display().to_string(),
            size_bytes: self.size().await?,
        })
    }
}

/// Serializable listing entry
#[derive(Debug, Clone, Serialize)]
pub struct StagedFileInfo {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
}
