//! Camera - dashcam session over its own Wi-Fi network
//!
//! ## Responsibilities
//!
//! - Exclusive use of the radio while on the camera network
//! - Join the camera network, run caller work, always release
//! - List locked videos, fetch them, delete fetched ones
//!
//! ## Session lifecycle
//!
//! `Idle -> NetworkJoined -> (work) -> NetworkReleasing -> Idle`
//!
//! The release step runs whether the work succeeded or failed.

pub mod http;
pub mod listing;
pub mod types;

pub use http::HttpCamera;
pub use types::{RemoteVideoFile, DEFAULT_CAMERA_HOST, DEFAULT_LOCKED_FOLDERS};

use crate::error::Result;
use crate::models::VideoContent;
use crate::wifi::{with_network, RadioLock, WifiManager};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Camera operations, valid while joined to the camera network
#[async_trait]
pub trait CameraApi: Send + Sync {
    /// Files in all locked folders, queried concurrently
    async fn list_locked_files(&self) -> Result<Vec<RemoteVideoFile>>;

    /// Raw bytes of one file; any non-2xx is an error
    async fn fetch(&self, file: &RemoteVideoFile) -> Result<VideoContent>;

    /// Delete one file; 404 counts as success
    async fn delete_remote(&self, file: &RemoteVideoFile) -> Result<()>;
}

/// Camera session factory
pub struct CameraSession {
    ssid: String,
    wifi: Arc<dyn WifiManager>,
    camera: Arc<dyn CameraApi>,
    radio: RadioLock,
}

impl CameraSession {
    pub fn new(
        ssid: String,
        wifi: Arc<dyn WifiManager>,
        camera: Arc<dyn CameraApi>,
        radio: RadioLock,
    ) -> Self {
        Self {
            ssid,
            wifi,
            camera,
            radio,
        }
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Join the camera network and run `work` with a controller.
    ///
    /// Waits for the radio if an upload cycle currently owns it.
    pub async fn connect<F, Fut, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(CameraController) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _lease = self.radio.acquire("camera").await?;
        let controller = CameraController {
            camera: self.camera.clone(),
        };

        tracing::info!(ssid = %self.ssid, "Connecting to camera");
        let result = with_network(self.wifi.as_ref(), &self.ssid, || work(controller)).await;
        tracing::info!(ssid = %self.ssid, ok = result.is_ok(), "Camera session ended");

        result
    }
}

/// Handle given to session work
#[derive(Clone)]
pub struct CameraController {
    camera: Arc<dyn CameraApi>,
}

impl CameraController {
    pub async fn list_locked_files(&self) -> Result<Vec<RemoteVideoFile>> {
        self.camera.list_locked_files().await
    }

    pub async fn fetch(&self, file: &RemoteVideoFile) -> Result<VideoContent> {
        self.camera.fetch(file).await
    }

    pub async fn delete_remote(&self, file: &RemoteVideoFile) -> Result<()> {
        self.camera.delete_remote(file).await
    }
}
