//! ReconciliationLoop - event-driven upload scheduling
//!
//! ## Responsibilities
//!
//! - Evaluate once at startup, on every Wi-Fi connect and on every heartbeat
//! - Skip uploads while associated with the camera network or offline
//! - Keep exactly one heartbeat pending while connected
//! - Cancel the heartbeat on disconnect
//!
//! ## Design
//!
//! All events go through one mpsc queue and are handled by a single worker,
//! so evaluations never overlap. A heartbeat is a spawned sleep tagged with
//! a generation number; cancelling aborts the task and bumps the generation
//! so a heartbeat already queued is recognised as stale.
//!
//! ## Module layout
//! - `types`: events, reports and loop status
//! - `upload_cycle`: staging to cloud transfer

pub mod types;
pub mod upload_cycle;

pub use types::{FileSync, LoopEvent, LoopStatus, RunOutcome, SkipReason, UploadReport};
pub use upload_cycle::UploadCycle;

use crate::error::{Error, Result};
use crate::wifi::{RadioLock, WifiManager};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Default heartbeat interval
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

const EVENT_QUEUE_CAPACITY: usize = 32;

/// Sender side of the loop's event queue
#[derive(Clone)]
pub struct LoopHandle {
    tx: mpsc::Sender<LoopEvent>,
}

impl LoopHandle {
    pub async fn send(&self, event: LoopEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::Internal("Reconciliation loop has stopped".to_string()))
    }

    /// Ask the loop to stop after the current evaluation
    pub async fn shutdown(&self) -> Result<()> {
        self.send(LoopEvent::Shutdown).await
    }
}

/// Event-driven upload scheduler
pub struct ReconciliationLoop {
    camera_ssid: String,
    heartbeat_interval: Duration,
    wifi: Arc<dyn WifiManager>,
    upload: UploadCycle,
    radio: RadioLock,
    tx: mpsc::Sender<LoopEvent>,
    rx: mpsc::Receiver<LoopEvent>,
    heartbeat: Option<JoinHandle<()>>,
    generation: u64,
    status: Arc<RwLock<LoopStatus>>,
}

impl ReconciliationLoop {
    pub fn new(
        camera_ssid: impl Into<String>,
        heartbeat_interval: Duration,
        wifi: Arc<dyn WifiManager>,
        upload: UploadCycle,
        radio: RadioLock,
    ) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        Self {
            camera_ssid: camera_ssid.into(),
            heartbeat_interval,
            wifi,
            upload,
            radio,
            tx,
            rx,
            heartbeat: None,
            generation: 0,
            status: Arc::new(RwLock::new(LoopStatus::default())),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            tx: self.tx.clone(),
        }
    }

    /// Shared status, readable while the loop runs
    pub fn status(&self) -> Arc<RwLock<LoopStatus>> {
        self.status.clone()
    }

    /// Whether a heartbeat is scheduled and has not fired yet
    pub fn has_pending_heartbeat(&self) -> bool {
        self.heartbeat
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Generation of the current heartbeat schedule
    pub fn heartbeat_generation(&self) -> u64 {
        self.generation
    }

    /// Next queued event
    pub async fn next_event(&mut self) -> Option<LoopEvent> {
        self.rx.recv().await
    }

    /// Run until `Shutdown` is received
    pub async fn run(mut self) {
        tracing::info!(
            camera_ssid = %self.camera_ssid,
            heartbeat_secs = self.heartbeat_interval.as_secs(),
            "Starting reconciliation loop"
        );

        let forwarder = self.spawn_forwarder();

        self.handle_event(LoopEvent::Startup).await;
        while let Some(event) = self.next_event().await {
            if self.handle_event(event).await == RunOutcome::Stopped {
                break;
            }
        }

        forwarder.abort();
        self.cancel_heartbeat();
        tracing::info!("Reconciliation loop stopped");
    }

    /// Bridge Wi-Fi connectivity events into the loop's queue
    fn spawn_forwarder(&self) -> JoinHandle<()> {
        let mut events = self.wifi.subscribe();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if tx.send(event.into()).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "Connectivity events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Handle one event
    pub async fn handle_event(&mut self, event: LoopEvent) -> RunOutcome {
        match &event {
            LoopEvent::Shutdown => {
                self.cancel_heartbeat();
                return RunOutcome::Stopped;
            }
            LoopEvent::Disconnected => {
                tracing::info!("WiFi disconnected");
                self.cancel_heartbeat();
                return RunOutcome::Idle;
            }
            LoopEvent::Heartbeat(generation) if *generation != self.generation => {
                tracing::debug!(
                    generation = generation,
                    current = self.generation,
                    "Ignoring stale heartbeat"
                );
                return RunOutcome::StaleHeartbeat;
            }
            LoopEvent::Connected(ssid) => {
                tracing::info!(ssid = %ssid, "WiFi connected");
            }
            LoopEvent::Startup | LoopEvent::Heartbeat(_) => {}
        }

        self.cancel_heartbeat();
        let outcome = self.evaluate().await;
        self.schedule_heartbeat();
        outcome
    }

    async fn evaluate(&self) -> RunOutcome {
        let outcome = match self.wifi.current_ssid().await {
            Ok(Some(ssid)) if ssid == self.camera_ssid => {
                tracing::debug!(ssid = %ssid, "On camera network, skipping upload");
                RunOutcome::Skipped(SkipReason::CameraNetwork)
            }
            Ok(None) => {
                tracing::debug!("Not connected, skipping upload");
                RunOutcome::Skipped(SkipReason::Offline)
            }
            Ok(Some(_)) => match self.radio.try_acquire("upload") {
                Ok(Some(_lease)) => match self.upload.run().await {
                    Ok(report) => RunOutcome::Uploaded(report),
                    Err(e) => {
                        tracing::error!(error = %e, "Upload cycle failed");
                        RunOutcome::Failed(e.to_string())
                    }
                },
                Ok(None) => {
                    tracing::debug!("Radio busy, skipping upload");
                    RunOutcome::Skipped(SkipReason::RadioBusy)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to take the radio lock");
                    RunOutcome::Failed(e.to_string())
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to read WiFi status");
                RunOutcome::Failed(e.to_string())
            }
        };

        self.record(&outcome).await;
        outcome
    }

    async fn record(&self, outcome: &RunOutcome) {
        let mut status = self.status.write().await;
        status.runs += 1;
        status.last_run_at = Some(Utc::now());

        match outcome {
            RunOutcome::Uploaded(report) => {
                status.last_report = Some(report.clone());
                status.last_skip = None;
                if report.failed == 0 {
                    status.consecutive_failures = 0;
                    status.last_error = None;
                } else {
                    status.consecutive_failures += 1;
                    status.last_error = Some(format!("{} file(s) failed", report.failed));
                }
            }
            RunOutcome::Skipped(reason) => {
                status.last_skip = Some(*reason);
            }
            RunOutcome::Failed(message) => {
                status.consecutive_failures += 1;
                status.last_error = Some(message.clone());
            }
            _ => {}
        }
    }

    fn schedule_heartbeat(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let interval = self.heartbeat_interval;
        let tx = self.tx.clone();

        tracing::debug!(
            generation = generation,
            interval_secs = interval.as_secs(),
            "Heartbeat scheduled"
        );
        self.heartbeat = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = tx.send(LoopEvent::Heartbeat(generation)).await;
        }));
    }

    fn cancel_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
            self.generation += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_event_from_connectivity() {
        use crate::wifi::ConnectivityEvent;

        assert_eq!(
            LoopEvent::from(ConnectivityEvent::Connected("Home".to_string())),
            LoopEvent::Connected("Home".to_string())
        );
        assert_eq!(
            LoopEvent::from(ConnectivityEvent::Disconnected),
            LoopEvent::Disconnected
        );
    }

    #[test]
    fn test_upload_report_total() {
        let report = UploadReport {
            uploaded: 2,
            already_present: 1,
            failed: 1,
        };
        assert_eq!(report.total(), 4);
    }
}
