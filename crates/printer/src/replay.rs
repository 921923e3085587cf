//! File-based telemetry replay for development.
//!
//! Reads newline-delimited JSON snapshots (one full status report per
//! line) and publishes them through a [`PrinterDriver`] at a fixed
//! cadence, so the whole monitor can be exercised without a printer on
//! the network.  Commands other than log-level changes are logged and
//! dropped; there is no device to carry them out.

use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use printwatch_core::PrinterStatus;

use crate::events::PrinterCommand;
use crate::link::PrinterDriver;

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// NDJSON file of recorded status reports.
    pub path: PathBuf,
    /// Delay between consecutive snapshots.
    pub interval: Duration,
}

/// Replay the recorded telemetry to the end, then report a disconnect.
pub async fn run(mut driver: PrinterDriver, config: ReplayConfig) -> std::io::Result<()> {
    let file = File::open(&config.path).await?;
    let mut lines = BufReader::new(file).lines();

    tracing::info!(
        path = %config.path.display(),
        interval_ms = config.interval.as_millis() as u64,
        "Replaying recorded telemetry",
    );
    driver.publish_connection(true).await;

    let mut ticker = tokio::time::interval(config.interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match lines.next_line().await? {
                    Some(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<PrinterStatus>(&line) {
                            Ok(status) => driver.publish_report(status).await,
                            Err(error) => {
                                tracing::warn!(%error, "Skipping unparseable replay line");
                            }
                        }
                    }
                    None => break,
                }
            }
            command = driver.next_command() => match command {
                Some(PrinterCommand::SetLogLevel { level }) => {
                    driver.publish_log_level(level).await;
                }
                Some(command) => {
                    tracing::debug!(?command, "Replay source cannot execute printer command");
                }
                // Every handle is gone, so nobody is listening.
                None => {
                    tracing::info!("Printer handles dropped, stopping replay");
                    return Ok(());
                }
            }
        }
    }

    tracing::info!("Replay finished, reporting printer as disconnected");
    driver.publish_connection(false).await;
    Ok(())
}
