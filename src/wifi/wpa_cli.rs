//! wpa_cli wrapper
//!
//! Drives wpa_supplicant through its control CLI. Networks must already be
//! provisioned in `wpa_supplicant.conf`; the camera network is best marked
//! `disabled=1` there so that `reconfigure` followed by `reconnect` hands
//! the radio back to the general network after a camera session.

use super::types::{ConnectivityEvent, ConnectivityState, KnownNetwork, WpaStatus};
use super::WifiManager;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the connectivity event channel
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// wpa_cli backed Wi-Fi manager
pub struct WpaCliWifi {
    /// wpa_cli binary
    wpa_cli_path: String,
    /// Wireless interface (e.g. wlan0)
    interface: String,
    /// Status polling interval for connectivity events
    poll_interval: Duration,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl WpaCliWifi {
    pub fn new(interface: &str, poll_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            wpa_cli_path: "wpa_cli".to_string(),
            interface: interface.to_string(),
            poll_interval,
            events,
        }
    }

    /// Use a different wpa_cli binary
    pub fn with_wpa_cli_path(mut self, path: &str) -> Self {
        self.wpa_cli_path = path.to_string();
        self
    }

    async fn wpa_cli(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.wpa_cli_path)
            .arg("-i")
            .arg(&self.interface)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::Wifi(format!("{} not installed", self.wpa_cli_path))
                } else {
                    Error::Wifi(format!("wpa_cli execution failed: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Wifi(format!(
                "wpa_cli {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a command whose only output is OK/FAIL
    async fn wpa_cli_ok(&self, args: &[&str]) -> Result<bool> {
        let out = self.wpa_cli(args).await?;
        Ok(out.trim() == "OK")
    }

    /// Networks provisioned in wpa_supplicant
    pub async fn list_networks(&self) -> Result<Vec<KnownNetwork>> {
        let out = self.wpa_cli(&["list_networks"]).await?;
        Ok(parse_list_networks(&out))
    }

    /// Current supplicant status
    pub async fn status(&self) -> Result<WpaStatus> {
        let out = self.wpa_cli(&["status"]).await?;
        Ok(parse_status(&out))
    }

    /// Poll the supplicant and publish connectivity changes
    pub fn spawn_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let wifi = self.clone();

        tokio::spawn(async move {
            let mut last = match wifi.status().await {
                Ok(status) => ConnectivityState::from_ssid(status.connected_ssid()),
                Err(e) => {
                    tracing::warn!(error = %e, "Initial Wi-Fi status failed");
                    ConnectivityState::Disconnected
                }
            };

            tracing::info!(
                interface = %wifi.interface,
                poll_interval_secs = wifi.poll_interval.as_secs(),
                state = ?last,
                "Wi-Fi monitor started"
            );

            let mut ticker = tokio::time::interval(wifi.poll_interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let current = match wifi.status().await {
                    Ok(status) => ConnectivityState::from_ssid(status.connected_ssid()),
                    Err(e) => {
                        tracing::warn!(error = %e, "Wi-Fi status poll failed");
                        continue;
                    }
                };

                if current != last {
                    let event = current.to_event();
                    tracing::debug!(event = ?event, "Connectivity changed");
                    // no receivers is fine
                    let _ = wifi.events.send(event);
                    last = current;
                }
            }
        })
    }
}

#[async_trait]
impl WifiManager for WpaCliWifi {
    async fn current_ssid(&self) -> Result<Option<String>> {
        Ok(self.status().await?.connected_ssid())
    }

    async fn connect_known_network(&self, ssid: &str) -> Result<()> {
        let networks = self.list_networks().await?;
        let network = networks
            .iter()
            .find(|n| n.ssid == ssid)
            .ok_or_else(|| Error::Config(format!("Network with SSID '{}' is not configured", ssid)))?;

        let id = network.id.to_string();
        if !self.wpa_cli_ok(&["select_network", &id]).await? {
            return Err(Error::WifiConnection {
                ssid: ssid.to_string(),
            });
        }

        tracing::info!(ssid = %ssid, network_id = network.id, "Selected network");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.wpa_cli_ok(&["disconnect"]).await? {
            return Err(Error::Wifi("wpa_cli disconnect returned FAIL".to_string()));
        }
        if !self.wpa_cli_ok(&["reconfigure"]).await? {
            return Err(Error::Wifi("wpa_cli reconfigure returned FAIL".to_string()));
        }
        // reconfigure keeps the disconnected flag; clear it so the radio rejoins
        if !self.wpa_cli_ok(&["reconnect"]).await? {
            return Err(Error::Wifi("wpa_cli reconnect returned FAIL".to_string()));
        }
        tracing::info!(interface = %self.interface, "Released network");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}

/// Parse `wpa_cli list_networks`
///
/// ```text
/// network id / ssid / bssid / flags
/// 0       HomeNet any     [CURRENT]
/// 1       FITCAMX_1234    any     [DISABLED]
/// ```
pub fn parse_list_networks(output: &str) -> Vec<KnownNetwork> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let id = parts.next()?.trim().parse::<u32>().ok()?;
            let ssid = parts.next()?.to_string();
            let _bssid = parts.next();
            let flags = parts.next().unwrap_or_default().trim().to_string();
            Some(KnownNetwork { id, ssid, flags })
        })
        .collect()
}

/// Parse `wpa_cli status` key=value output
pub fn parse_status(output: &str) -> WpaStatus {
    let mut status = WpaStatus::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "wpa_state" => status.wpa_state = value.trim().to_string(),
            "ssid" => status.ssid = Some(value.to_string()),
            "bssid" => status.bssid = Some(value.trim().to_string()),
            "id" => status.id = value.trim().parse().ok(),
            _ => {}
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_networks() {
        let output = "Selected interface 'wlan0'\n\
                      network id / ssid / bssid / flags\n\
                      0\tHomeNet\tany\t[CURRENT]\n\
                      1\tFITCAMX_1234\tany\t[DISABLED]\n\
                      2\tCafe Wifi\tany\t\n";

        let networks = parse_list_networks(output);
        assert_eq!(networks.len(), 3);
        assert_eq!(networks[0].id, 0);
        assert_eq!(networks[0].ssid, "HomeNet");
        assert_eq!(networks[0].flags, "[CURRENT]");
        assert_eq!(networks[1].ssid, "FITCAMX_1234");
        assert_eq!(networks[2].ssid, "Cafe Wifi");
        assert_eq!(networks[2].flags, "");
    }

    #[test]
    fn test_parse_status_completed() {
        let output = "bssid=aa:bb:cc:dd:ee:ff\n\
                      freq=2437\n\
                      ssid=HomeNet\n\
                      id=0\n\
                      mode=station\n\
                      wpa_state=COMPLETED\n\
                      ip_address=192.168.0.12\n";

        let status = parse_status(output);
        assert!(status.is_connected());
        assert_eq!(status.connected_ssid().as_deref(), Some("HomeNet"));
        assert_eq!(status.id, Some(0));
        assert_eq!(status.bssid.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn test_parse_status_scanning() {
        let status = parse_status("wpa_state=SCANNING\nssid=HomeNet\n");
        assert!(!status.is_connected());
        assert_eq!(status.connected_ssid(), None);
    }

    #[test]
    fn test_state_transitions_to_events() {
        assert_eq!(
            ConnectivityState::from_ssid(Some("HomeNet".into())).to_event(),
            ConnectivityEvent::Connected("HomeNet".into())
        );
        assert_eq!(
            ConnectivityState::from_ssid(None).to_event(),
            ConnectivityEvent::Disconnected
        );
    }

    /// Stub wpa_cli that appends its arguments to `calls.log` and answers `reply`
    #[cfg(unix)]
    fn stub_wpa_cli(dir: &std::path::Path, reply: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("wpa_cli");
        let log = dir.join("calls.log");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$*\" >> '{}'\necho {}\n",
                log.display(),
                reply
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.display().to_string()
    }

    #[cfg(unix)]
    fn logged_calls(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_disconnect_rejoins_general_network() {
        let dir = tempfile::tempdir().unwrap();
        let wifi = WpaCliWifi::new("wlan0", Duration::from_secs(5))
            .with_wpa_cli_path(&stub_wpa_cli(dir.path(), "OK"));

        wifi.disconnect().await.unwrap();

        assert_eq!(
            logged_calls(dir.path()),
            vec!["-i wlan0 disconnect", "-i wlan0 reconfigure", "-i wlan0 reconnect"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_disconnect_fail_stops_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let wifi = WpaCliWifi::new("wlan0", Duration::from_secs(5))
            .with_wpa_cli_path(&stub_wpa_cli(dir.path(), "FAIL"));

        assert!(matches!(wifi.disconnect().await, Err(Error::Wifi(_))));
        assert_eq!(logged_calls(dir.path()), vec!["-i wlan0 disconnect"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_wifi_error() {
        let wifi = WpaCliWifi::new("wlan0", Duration::from_secs(5))
            .with_wpa_cli_path("/nonexistent/wpa_cli");
        assert!(matches!(wifi.current_ssid().await, Err(Error::Wifi(_))));
    }
}
