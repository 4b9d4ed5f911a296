//! Dashcam Sync Library
//!
//! Moves locked dashcam recordings to cloud storage through a local staging
//! directory. The camera is only reachable over its own Wi-Fi access point,
//! so fetching from the camera and uploading to the cloud happen at
//! different times on the same radio.
//!
//! ## Architecture
//!
//! 1. Retry - bounded fixed-interval retry for idempotent remote calls
//! 2. StagingStore - local directory with acceptance marker and capacity guard
//! 3. WifiManager - network join/release, connectivity events, radio lock
//! 4. CameraSession - scoped camera network session + HTTP controller
//! 5. FetchCycle - camera -> staging
//! 6. CloudUploader - existence check + upload
//! 7. ReconciliationLoop - event-driven staging -> cloud
//!
//! ## Data flow
//!
//! ```text
//! camera --(FetchCycle)--> staging dir --(UploadCycle)--> cloud bucket
//! ```
//!
//! A file is deleted from its source only after the next hop confirmed it.

pub mod camera;
pub mod cloud;
pub mod error;
pub mod fetch_cycle;
pub mod file_storage;
pub mod logging;
pub mod models;
pub mod reconcile;
pub mod retry;
pub mod state;
pub mod wifi;

pub use error::{Error, Result};
pub use state::{AppConfig, AppState};
