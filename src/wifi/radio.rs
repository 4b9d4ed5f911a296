//! RadioLock - single owner of the Wi-Fi radio
//!
//! The device has one radio. A camera session holds the lease for as long
//! as it is joined to the camera network; an upload cycle holds it while
//! it talks to the cloud. The lease is released on drop.
//!
//! `fetch` and `daemon` run as separate processes, so a shared lock also
//! takes an exclusive advisory lock on a file (`.radio.lock` in the staging
//! directory). The in-process mutex is taken first; the file lock is
//! per open file, so two `RadioLock`s on the same path exclude each other
//! even inside one process.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock file name inside the staging directory
pub const RADIO_LOCK_FILE: &str = ".radio.lock";

/// Radio ownership lock
#[derive(Clone, Default)]
pub struct RadioLock {
    lock: Arc<Mutex<()>>,
    /// Cross-process lock file, `None` for an in-process lock
    lock_file: Option<Arc<PathBuf>>,
}

impl RadioLock {
    /// In-process lock only
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock shared with every process using the same `lock_file`
    pub fn shared(lock_file: impl Into<PathBuf>) -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            lock_file: Some(Arc::new(lock_file.into())),
        }
    }

    /// Wait until the radio is free
    pub async fn acquire(&self, owner: &'static str) -> Result<RadioLease> {
        let guard = self.lock.clone().lock_owned().await;

        let file = match &self.lock_file {
            Some(path) => {
                let path = path.clone();
                let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
                    let file = open_lock_file(&path)?;
                    FileExt::lock_exclusive(&file)?;
                    Ok(file)
                })
                .await
                .map_err(|e| Error::Internal(format!("Radio lock task failed: {}", e)))??;
                Some(file)
            }
            None => None,
        };

        tracing::debug!(owner = owner, "Radio acquired");
        Ok(RadioLease {
            owner,
            file,
            _guard: guard,
        })
    }

    /// Take the radio only if nobody holds it, in this or another process
    pub fn try_acquire(&self, owner: &'static str) -> Result<Option<RadioLease>> {
        let Ok(guard) = self.lock.clone().try_lock_owned() else {
            tracing::debug!(owner = owner, "Radio busy");
            return Ok(None);
        };

        let file = match &self.lock_file {
            Some(path) => {
                let file = open_lock_file(path)?;
                match FileExt::try_lock_exclusive(&file) {
                    Ok(()) => Some(file),
                    Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                        tracing::debug!(owner = owner, "Radio busy (held by another process)");
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None => None,
        };

        tracing::debug!(owner = owner, "Radio acquired (try)");
        Ok(Some(RadioLease {
            owner,
            file,
            _guard: guard,
        }))
    }
}

fn open_lock_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

/// Radio lease - released on drop
pub struct RadioLease {
    owner: &'static str,
    file: Option<File>,
    _guard: OwnedMutexGuard<()>,
}

impl RadioLease {
    pub fn owner(&self) -> &'static str {
        self.owner
    }
}

impl Drop for RadioLease {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            // closing the file drops the lock as well
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!(owner = self.owner, error = %e, "Radio lock file unlock failed");
            }
        }
        tracing::debug!(owner = self.owner, "Radio released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_release() {
        let radio = RadioLock::new();

        let lease = radio.acquire("camera").await.unwrap();
        assert_eq!(lease.owner(), "camera");
        drop(lease);

        let _again = radio.acquire("upload").await.unwrap();
    }

    #[tokio::test]
    async fn test_try_acquire_busy() {
        let radio = RadioLock::new();
        let shared = radio.clone();

        let _lease = radio.acquire("camera").await.unwrap();
        assert!(shared.try_acquire("upload").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_waiter_gets_radio_after_release() {
        let radio = RadioLock::new();
        let lease = radio.acquire("camera").await.unwrap();

        let waiter = {
            let radio = radio.clone();
            tokio::spawn(async move { radio.acquire("upload").await.unwrap().owner() })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(lease);
        assert_eq!(waiter.await.unwrap(), "upload");
    }

    #[tokio::test]
    async fn test_lock_file_excludes_independent_locks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RADIO_LOCK_FILE);

        // Two independent locks stand in for the fetch and daemon processes
        let fetch_side = RadioLock::shared(&path);
        let daemon_side = RadioLock::shared(&path);

        let lease = fetch_side.try_acquire("camera").unwrap().unwrap();
        assert!(daemon_side.try_acquire("upload").unwrap().is_none());

        drop(lease);
        let lease = daemon_side.try_acquire("upload").unwrap();
        assert_eq!(lease.map(|l| l.owner()), Some("upload"));
    }

    #[tokio::test]
    async fn test_lock_file_waiter_unblocks_on_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RADIO_LOCK_FILE);

        let upload_side = RadioLock::shared(&path);
        let camera_side = RadioLock::shared(&path);
        let lease = upload_side.acquire("upload").await.unwrap();

        let waiter =
            tokio::spawn(async move { camera_side.acquire("camera").await.unwrap().owner() });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        drop(lease);
        let owner = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner, "camera");
    }
}
