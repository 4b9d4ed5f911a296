//! Wi-Fi - connectivity capability
//!
//! ## Responsibilities
//!
//! - Report the SSID the radio is currently associated with
//! - Join a provisioned network and release it again
//! - Publish `Connected(ssid)` / `Disconnected` events
//! - Radio ownership (one network-dependent job at a time)
//!
//! ## Module layout
//! - `types`: events and supplicant status
//! - `wpa_cli`: wpa_supplicant backed implementation
//! - `radio`: radio ownership lock

pub mod radio;
pub mod types;
pub mod wpa_cli;

pub use radio::{RadioLease, RadioLock, RADIO_LOCK_FILE};
pub use types::{ConnectivityEvent, ConnectivityState, KnownNetwork, WpaStatus};
pub use wpa_cli::WpaCliWifi;

use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use tokio::sync::broadcast;

/// Wi-Fi manager
#[async_trait]
pub trait WifiManager: Send + Sync {
    /// SSID of the associated network, `None` when not connected
    async fn current_ssid(&self) -> Result<Option<String>>;

    /// Join a provisioned network.
    ///
    /// Fails with `Error::Config` when the SSID is not provisioned and with
    /// `Error::WifiConnection` when the join itself fails.
    async fn connect_known_network(&self, ssid: &str) -> Result<()>;

    /// Leave the current network and return to the default configuration
    async fn disconnect(&self) -> Result<()>;

    /// Subscribe to connectivity changes
    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent>;
}

/// Join `ssid` for the duration of `work`.
///
/// Once the join succeeded the network is released exactly once, whether
/// `work` succeeds or fails. An error from `work` wins over a release error.
pub async fn with_network<W, F, Fut, T>(wifi: &W, ssid: &str, work: F) -> Result<T>
where
    W: WifiManager + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    wifi.connect_known_network(ssid).await?;
    tracing::info!(ssid = %ssid, "Joined network");

    let result = work().await;
    let released = wifi.disconnect().await;

    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => {
            tracing::error!(ssid = %ssid, error = %e, "Failed to release network");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release_err)) => {
            tracing::error!(
                ssid = %ssid,
                error = %release_err,
                "Failed to release network after failed work"
            );
            Err(e)
        }
    }
}
