//! FileStorage - Local Staging Store
//!
//! ## Responsibilities
//!
//! - Durable staging of camera videos pending upload
//! - Acceptance marker: only names >= the newest accepted name are stored
//! - Occupancy guard: refuse writes into an empty/unmounted directory
//! - Rollback of partial writes (the visible file is never truncated)
//!
//! ## Layout
//!
//! ```text
//! <staging_dir>/
//!   .fetch_history          acceptance marker (raw file name, no newline)
//!   .20230101000600_xx.MP4.partial   video still being written
//!   20230101000500_xx.MP4   staged videos
//! ```
//!
//! A video is streamed into its hidden `.partial` name, fsynced and renamed
//! into place before the marker moves, so a listed file is always complete.
//!
//! Entries whose name starts with `.` are reserved and never listed.

pub mod types;

pub use types::{StagedFileInfo, StagedVideoFile, StoreOutcome};

use crate::error::{Error, Result};
use crate::models::{parse_capture_timestamp, stream_from_bytes, VideoStream};
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Reserved prefix for bookkeeping files
pub const HIDDEN_PREFIX: char = '.';

/// Acceptance marker file name
pub const MARKER_FILE: &str = ".fetch_history";

const MARKER_TMP_FILE: &str = ".fetch_history.tmp";

/// Default minimum directory entry count before writes are allowed
pub const DEFAULT_MIN_OCCUPANCY: usize = 80;

/// Staging store over one directory
pub struct StagingStore {
    dir: PathBuf,
    min_occupancy: usize,
    /// Serializes marker read/compare/write across concurrent stores
    write_lock: Mutex<()>,
}

impl StagingStore {
    /// Open the store, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>, min_occupancy: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            tracing::error!(dir = %dir.display(), error = %e, "Could not create staging directory");
            e
        })?;

        tracing::debug!(
            dir = %dir.display(),
            min_occupancy = min_occupancy,
            "Staging store opened"
        );

        Ok(Self {
            dir,
            min_occupancy,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn min_occupancy(&self) -> usize {
        self.min_occupancy
    }

    /// Number of non-hidden entries in the staging directory
    pub async fn occupancy(&self) -> Result<usize> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if !is_hidden(&entry.file_name().to_string_lossy()) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Fail when occupancy is below the configured minimum
    pub async fn check_capacity(&self) -> Result<()> {
        let occupancy = self.occupancy().await?;
        if occupancy < self.min_occupancy {
            tracing::warn!(
                dir = %self.dir.display(),
                occupancy = occupancy,
                minimum = self.min_occupancy,
                "Staging directory below minimum occupancy"
            );
            return Err(Error::CapacityGuard {
                occupancy,
                minimum: self.min_occupancy,
            });
        }
        Ok(())
    }

    /// Current acceptance marker, `None` before the first accepted file
    pub async fn acceptance_marker(&self) -> Result<Option<String>> {
        let marker = self.read_marker().await?;
        Ok((!marker.is_empty()).then_some(marker))
    }

    /// Store a video under `name`.
    ///
    /// `open` is only invoked once the occupancy guard, the name check and
    /// the marker comparison have passed. On any write or marker failure
    /// the partial file is removed and the marker is left untouched.
    pub async fn store<F, Fut>(&self, name: &str, open: F) -> Result<StoreOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<VideoStream>>,
    {
        self.check_capacity().await?;
        validate_name(name)?;

        let _guard = self.write_lock.lock().await;

        let marker = self.read_marker().await?;
        if name < marker.as_str() {
            tracing::warn!(
                filename = %name,
                marker = %marker,
                "Already stored newer video file, stale file skipped"
            );
            return Ok(StoreOutcome::SkippedStale);
        }

        let stream = open().await?;
        let file_path = self.dir.join(name);
        let partial_path = self.dir.join(partial_name(name));

        tracing::debug!(filename = %name, "Writing file");

        let written = match write_stream(&partial_path, stream).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.rollback(&partial_path, &e).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&partial_path, &file_path).await {
            let e = Error::from(e);
            self.rollback(&partial_path, &e).await;
            return Err(e);
        }

        if let Err(e) = self.write_marker(name).await {
            self.rollback(&file_path, &e).await;
            return Err(e);
        }

        tracing::info!(
            file_path = %file_path.display(),
            size_bytes = written,
            "Wrote file"
        );

        Ok(StoreOutcome::Stored)
    }

    /// Staged videos, sorted by name
    pub async fn list(&self) -> Result<Vec<StagedVideoFile>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                tracing::debug!(entry = %name, "Skipping non-file staging entry");
                continue;
            }
            files.push(StagedVideoFile {
                path: entry.path(),
                name,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Whole file read into memory, exposed as a stream
    pub async fn open_stream(&self, name: &str) -> Result<VideoStream> {
        let path = self.dir.join(name);
        match fs::read(&path).await {
            Ok(data) => Ok(stream_from_bytes(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a staged video; a missing file is an error
    pub async fn delete(&self, name: &str) -> Result<()> {
        if is_hidden(name) {
            return Err(Error::NotFound(name.to_string()));
        }

        let path = self.dir.join(name);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(filename = %name, "Deleted staged file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_marker(&self) -> Result<String> {
        match fs::read_to_string(self.dir.join(MARKER_FILE)).await {
            Ok(s) => Ok(s.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_marker(&self, name: &str) -> Result<()> {
        let tmp = self.dir.join(MARKER_TMP_FILE);
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(name.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, self.dir.join(MARKER_FILE)).await?;
        Ok(())
    }

    async fn rollback(&self, file_path: &Path, cause: &Error) {
        tracing::error!(
            file_path = %file_path.display(),
            error = %cause,
            "Error writing file"
        );
        match fs::remove_file(file_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    file_path = %file_path.display(),
                    error = %e,
                    "Could not remove partial file"
                );
            }
        }
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with(HIDDEN_PREFIX)
}

/// Hidden name a video is streamed into before it becomes visible
fn partial_name(name: &str) -> String {
    format!("{}{}.partial", HIDDEN_PREFIX, name)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || is_hidden(name) || name.contains(['/', '\\']) {
        return Err(Error::InvalidFileName(name.to_string()));
    }
    if parse_capture_timestamp(name).is_none() {
        tracing::warn!(filename = %name, "File name lacks a capture timestamp prefix");
        return Err(Error::InvalidFileName(name.to_string()));
    }
    Ok(())
}

async fn write_stream(path: &Path, mut stream: VideoStream) -> Result<u64> {
    let mut file = fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
