//! Dashcam Sync - camera to cloud video pipeline
//!
//! ## Usage
//! ```bash
//! # Upload staged videos whenever a non-camera network is up
//! dashcam-sync daemon
//!
//! # Pull locked videos from the camera once
//! dashcam-sync fetch
//!
//! # Show what is waiting in the staging directory
//! dashcam-sync staged
//! ```

use clap::{Parser, Subcommand};
use dashcam_sync::{
    error::{EXIT_CONFIG, EXIT_STAGING_DIR},
    logging,
    state::{AppConfig, AppState},
    Error,
};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "dashcam-sync")]
#[command(about = "Stage locked dashcam recordings and sync them to cloud storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reconciliation loop until Ctrl-C
    Daemon,
    /// Run one fetch cycle against the camera
    Fetch,
    /// Print the staging directory contents as JSON
    Staged,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    dotenvy::dotenv().ok();

    logging::init();
    let cli = Cli::parse();

    tracing::info!("Starting dashcam-sync v{}", env!("CARGO_PKG_VERSION"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_CONFIG as u8);
        }
    };
    tracing::info!(
        camera_ssid = %config.camera_ssid,
        camera_host = %config.camera_host,
        staging_dir = %config.staging_dir.display(),
        heartbeat_secs = config.heartbeat_interval.as_secs(),
        upload_concurrency = config.upload_concurrency,
        "Configuration loaded"
    );

    let state = match AppState::build(config).await {
        Ok(state) => state,
        Err(e @ Error::Io(_)) => {
            tracing::error!(error = %e, "Failed to prepare staging directory");
            return ExitCode::from(EXIT_STAGING_DIR as u8);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    let result = match cli.command {
        Command::Daemon => run_daemon(state).await,
        Command::Fetch => run_fetch(state).await,
        Command::Staged => run_staged(state).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "dashcam-sync failed");
            match e.downcast_ref::<Error>() {
                Some(err) if err.is_fatal() => ExitCode::from(err.exit_code() as u8),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run_daemon(state: AppState) -> anyhow::Result<()> {
    let reconciliation = state.reconciliation_loop()?;
    let handle = reconciliation.handle();

    let monitor = state.wifi.spawn_monitor();
    tracing::info!(interface = %state.config.wifi_interface, "WiFi monitor started");

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        tracing::info!("Shutdown requested");
        if let Err(e) = handle.shutdown().await {
            tracing::warn!(error = %e, "Shutdown signal not delivered");
        }
    });

    reconciliation.run().await;
    monitor.abort();
    Ok(())
}

async fn run_fetch(state: AppState) -> anyhow::Result<()> {
    let report = state.fetch_cycle().run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_staged(state: AppState) -> anyhow::Result<()> {
    let store = &state.store;

    let mut files = Vec::new();
    for file in store.list().await? {
        files.push(file.info().await?);
    }

    let summary = serde_json::json!({
        "dir": store.dir().display().to_string(),
        "acceptance_marker": store.acceptance_marker().await?,
        "occupancy": store.occupancy().await?,
        "min_occupancy": store.min_occupancy(),
        "files": files,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
