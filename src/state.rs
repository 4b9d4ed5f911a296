//! Application state
//!
//! Environment-driven configuration and the wired component graph

use crate::camera::{CameraSession, HttpCamera, DEFAULT_CAMERA_HOST, DEFAULT_LOCKED_FOLDERS};
use crate::cloud::s3::{DEFAULT_ENDPOINT, DEFAULT_REGION};
use crate::cloud::{S3Config, S3Uploader};
use crate::error::{Error, Result};
use crate::fetch_cycle::{FetchCycle, FetchFailurePolicy};
use crate::file_storage::{StagingStore, DEFAULT_MIN_OCCUPANCY};
use crate::reconcile::{ReconciliationLoop, UploadCycle};
use crate::retry::{RetryPolicy, DEFAULT_ATTEMPTS, DEFAULT_INTERVAL_SECS};
use crate::wifi::{RadioLock, WpaCliWifi, RADIO_LOCK_FILE};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SSID of the camera's access point
    pub camera_ssid: String,
    /// Camera HTTP host
    pub camera_host: String,
    /// Camera folders holding locked recordings
    pub locked_folders: Vec<String>,
    pub camera_http_timeout: Duration,
    /// Staging directory
    pub staging_dir: PathBuf,
    /// Minimum entry count before the staging store accepts writes
    pub staging_min_occupancy: usize,
    pub heartbeat_interval: Duration,
    /// Files uploaded in parallel
    pub upload_concurrency: usize,
    pub retry: RetryPolicy,
    /// Wireless interface handed to wpa_cli
    pub wifi_interface: String,
    pub wifi_poll_interval: Duration,
    pub fetch_failure_policy: FetchFailurePolicy,
    /// Object store, required by the daemon only
    pub cloud: Option<S3Config>,
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; empty values count as unset
    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let camera_ssid = get("CAMERA_SSID")
            .ok_or_else(|| Error::Config("CAMERA_SSID is required".to_string()))?;

        let locked_folders = match get("CAMERA_LOCKED_FOLDERS") {
            Some(raw) => raw
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
            None => DEFAULT_LOCKED_FOLDERS.iter().map(|f| f.to_string()).collect(),
        };

        let upload_concurrency: usize = parse_or(&get, "UPLOAD_CONCURRENCY", 1)?;
        if upload_concurrency == 0 {
            return Err(Error::Config(
                "UPLOAD_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let retry = RetryPolicy::new(
            parse_or(&get, "RETRY_ATTEMPTS", DEFAULT_ATTEMPTS)?,
            Duration::from_secs(parse_or(&get, "RETRY_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?),
        );

        let fetch_failure_policy = match get("FETCH_FAILURE_POLICY") {
            Some(raw) => raw.parse()?,
            None => FetchFailurePolicy::default(),
        };

        let cloud = match get("CLOUD_BUCKET") {
            Some(bucket) => {
                let access_key_id = get("CLOUD_ACCESS_KEY_ID").ok_or_else(|| {
                    Error::Config("CLOUD_ACCESS_KEY_ID is required with CLOUD_BUCKET".to_string())
                })?;
                let secret_access_key = get("CLOUD_SECRET_ACCESS_KEY").ok_or_else(|| {
                    Error::Config(
                        "CLOUD_SECRET_ACCESS_KEY is required with CLOUD_BUCKET".to_string(),
                    )
                })?;
                Some(S3Config {
                    bucket,
                    endpoint: get("CLOUD_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                    region: get("CLOUD_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
                    access_key_id,
                    secret_access_key,
                    prefix: get("CLOUD_PREFIX"),
                })
            }
            None => None,
        };

        Ok(Self {
            camera_ssid,
            camera_host: get("CAMERA_HOST").unwrap_or_else(|| DEFAULT_CAMERA_HOST.to_string()),
            locked_folders,
            camera_http_timeout: Duration::from_secs(parse_or(
                &get,
                "CAMERA_HTTP_TIMEOUT_SECS",
                60,
            )?),
            staging_dir: get("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("dashcam-sync")),
            staging_min_occupancy: parse_or(&get, "STAGING_MIN_OCCUPANCY", DEFAULT_MIN_OCCUPANCY)?,
            heartbeat_interval: Duration::from_secs(parse_or(&get, "HEARTBEAT_INTERVAL_SECS", 30)?),
            upload_concurrency,
            retry,
            wifi_interface: get("WIFI_INTERFACE").unwrap_or_else(|| "wlan0".to_string()),
            wifi_poll_interval: Duration::from_secs(parse_or(&get, "WIFI_POLL_INTERVAL_SECS", 5)?),
            fetch_failure_policy,
            cloud,
        })
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

/// Wired components shared by the subcommands
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<StagingStore>,
    pub wifi: Arc<WpaCliWifi>,
    pub radio: RadioLock,
    pub camera_session: Arc<CameraSession>,
}

impl AppState {
    /// Open the staging store and build the camera side
    pub async fn build(config: AppConfig) -> Result<Self> {
        let store = Arc::new(
            StagingStore::open(config.staging_dir.clone(), config.staging_min_occupancy).await?,
        );
        tracing::info!(
            staging_dir = %config.staging_dir.display(),
            min_occupancy = config.staging_min_occupancy,
            "StagingStore initialized"
        );

        let wifi = Arc::new(WpaCliWifi::new(
            &config.wifi_interface,
            config.wifi_poll_interval,
        ));
        let radio = RadioLock::shared(config.staging_dir.join(RADIO_LOCK_FILE));

        let camera = Arc::new(HttpCamera::new(
            &config.camera_host,
            config.locked_folders.clone(),
            config.camera_http_timeout,
            config.retry,
        )?);
        tracing::info!(
            base_url = %camera.base_url(),
            folders = ?config.locked_folders,
            "HttpCamera initialized"
        );

        let camera_session = Arc::new(CameraSession::new(
            config.camera_ssid.clone(),
            wifi.clone(),
            camera,
            radio.clone(),
        ));

        Ok(Self {
            config,
            store,
            wifi,
            radio,
            camera_session,
        })
    }

    pub fn fetch_cycle(&self) -> FetchCycle {
        FetchCycle::new(
            self.camera_session.clone(),
            self.store.clone(),
            self.config.fetch_failure_policy,
        )
    }

    /// Build the upload scheduler; needs the cloud configuration
    pub fn reconciliation_loop(&self) -> Result<ReconciliationLoop> {
        let cloud_config = self
            .config
            .cloud
            .clone()
            .ok_or_else(|| Error::Config("CLOUD_BUCKET is required for the daemon".to_string()))?;

        tracing::info!(
            bucket = %cloud_config.bucket,
            endpoint = %cloud_config.endpoint,
            "S3Uploader initialized"
        );
        let cloud = Arc::new(S3Uploader::new(cloud_config, self.config.retry));

        let upload = UploadCycle::new(self.store.clone(), cloud, self.config.upload_concurrency);

        Ok(ReconciliationLoop::new(
            self.config.camera_ssid.clone(),
            self.config.heartbeat_interval,
            self.wifi.clone(),
            upload,
            self.radio.clone(),
        ))
    }
}
