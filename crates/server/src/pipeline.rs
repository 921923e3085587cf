//! Telemetry pipeline.
//!
//! A single task consumes printer events in order, so snapshot diffing,
//! change logging, job bookkeeping and viewer broadcasts all observe the
//! same sequence. Splitting these across tasks would let a status broadcast
//! overtake the job transition it caused.

use printwatch_core::diff_snapshots;
use printwatch_printer::PrinterEvent;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;
use crate::ws::messages::ServerMessage;

/// Runs until the event source closes.
pub async fn run(state: AppState, mut events: broadcast::Receiver<PrinterEvent>) {
    let mut previous: Option<Value> = None;
    loop {
        match events.recv().await {
            Ok(event) => handle_event(&state, &mut previous, event).await,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Telemetry pipeline lagged behind the printer");
            }
            Err(RecvError::Closed) => {
                tracing::info!("Printer event source closed; telemetry pipeline stopping");
                break;
            }
        }
    }
}

async fn handle_event(state: &AppState, previous: &mut Option<Value>, event: PrinterEvent) {
    match event {
        PrinterEvent::Report { status } => {
            let snapshot = match serde_json::to_value(&*status) {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    tracing::error!(%error, "Failed to encode a telemetry snapshot");
                    return;
                }
            };

            let changes = diff_snapshots(previous.as_ref(), &snapshot);
            for change in &changes {
                state.logbook.log_change(change).await;
            }
            state.engine.handle_report(&status, &changes).await;
            state
                .sessions
                .send_to_all(
                    ServerMessage::Status {
                        status: snapshot.clone(),
                    }
                    .to_message(),
                )
                .await;
            *previous = Some(snapshot);
        }
        PrinterEvent::ConnectionChanged { connected } => {
            let line = if connected {
                "Printer connected"
            } else {
                "Printer disconnected"
            };
            state.logbook.log(line).await;
            state.engine.handle_connection(connected).await;
            state
                .sessions
                .send_to_all(
                    ServerMessage::PrinterConnectionStatus {
                        is_connected: connected,
                    }
                    .to_message(),
                )
                .await;
        }
        PrinterEvent::LogLevelChanged { level } => {
            state
                .sessions
                .send_to_all(ServerMessage::PrinterLogLevel { level }.to_message())
                .await;
        }
        PrinterEvent::ProjectLoaded { job_id, project } => {
            state.engine.attach_project(job_id, project).await;
        }
    }
}
