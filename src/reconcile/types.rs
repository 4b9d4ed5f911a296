//! Reconciliation loop type definitions

use crate::wifi::ConnectivityEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Input of the reconciliation worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// Eager evaluation when the loop starts
    Startup,
    Connected(String),
    Disconnected,
    /// Heartbeat timer fired; carries the generation it was scheduled with
    Heartbeat(u64),
    Shutdown,
}

impl From<ConnectivityEvent> for LoopEvent {
    fn from(event: ConnectivityEvent) -> Self {
        match event {
            ConnectivityEvent::Connected(ssid) => LoopEvent::Connected(ssid),
            ConnectivityEvent::Disconnected => LoopEvent::Disconnected,
        }
    }
}

/// Per-file result of an upload cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSync {
    Uploaded,
    AlreadyPresent,
}

/// Outcome of one upload cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub uploaded: usize,
    pub already_present: usize,
    pub failed: usize,
}

impl UploadReport {
    pub fn total(&self) -> usize {
        self.uploaded + self.already_present + self.failed
    }
}

/// Why an evaluation did not upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Associated with the camera's own network
    CameraNetwork,
    /// Not associated with any network
    Offline,
    /// A camera session owns the radio
    RadioBusy,
}

/// Result of handling one loop event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Uploaded(UploadReport),
    Skipped(SkipReason),
    Failed(String),
    /// Disconnected: heartbeat cancelled, nothing scheduled
    Idle,
    /// Heartbeat from a cancelled schedule
    StaleHeartbeat,
    Stopped,
}

/// Loop observability state
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopStatus {
    /// Evaluations run (upload attempted or skipped)
    pub runs: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_report: Option<UploadReport>,
    pub last_skip: Option<SkipReason>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}
