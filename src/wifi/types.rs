//! Wi-Fi type definitions

use serde::Serialize;

/// Connectivity change pushed by the Wi-Fi manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "ssid", rename_all = "snake_case")]
pub enum ConnectivityEvent {
    Connected(String),
    Disconnected,
}

/// Last observed connectivity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectivityState {
    #[default]
    Disconnected,
    ConnectedTo(String),
}

impl ConnectivityState {
    pub fn from_ssid(ssid: Option<String>) -> Self {
        match ssid {
            Some(ssid) => Self::ConnectedTo(ssid),
            None => Self::Disconnected,
        }
    }

    /// Event announcing a move into this state
    pub fn to_event(&self) -> ConnectivityEvent {
        match self {
            Self::ConnectedTo(ssid) => ConnectivityEvent::Connected(ssid.clone()),
            Self::Disconnected => ConnectivityEvent::Disconnected,
        }
    }
}

/// Network provisioned in wpa_supplicant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownNetwork {
    pub id: u32,
    pub ssid: String,
    pub flags: String,
}

/// Subset of `wpa_cli status` output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WpaStatus {
    pub wpa_state: String,
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub id: Option<u32>,
}

impl WpaStatus {
    /// Associated and authenticated
    pub fn is_connected(&self) -> bool {
        self.wpa_state == "COMPLETED"
    }

    pub fn connected_ssid(&self) -> Option<String> {
        if self.is_connected() {
            self.ssid.clone()
        } else {
            None
        }
    }
}
