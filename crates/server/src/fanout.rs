//! Viewer fan-out for job and log events.
//!
//! Lifecycle transitions refresh every viewer's current-job panel and
//! history row; edits to old jobs only touch the history row, so a comment
//! on last week's print never clobbers what the dashboard shows as running.

use printwatch_jobs::JobEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;
use crate::ws::messages::ServerMessage;

/// Consumes job lifecycle events until the engine is dropped.
pub async fn run_jobs(state: AppState, mut events: broadcast::Receiver<JobEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => handle_job_event(&state, event).await,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Job fan-out lagged behind the engine");
            }
            Err(RecvError::Closed) => {
                tracing::info!("Job event source closed; fan-out stopping");
                break;
            }
        }
    }
}

async fn handle_job_event(state: &AppState, event: JobEvent) {
    match &event {
        JobEvent::Created { job } => state.logbook.log_job_started(job).await,
        JobEvent::Finished { job } => state.logbook.log_job_finished(job).await,
        JobEvent::Updated { .. } | JobEvent::Edited { .. } => {}
    }

    match event {
        JobEvent::Created { job } | JobEvent::Updated { job } | JobEvent::Finished { job } => {
            state
                .sessions
                .send_to_all(
                    ServerMessage::CurrentJob {
                        job: Some(job.clone()),
                    }
                    .to_message(),
                )
                .await;
            state
                .sessions
                .send_to_all(ServerMessage::JobUpdated { job }.to_message())
                .await;
        }
        JobEvent::Edited { job } => {
            state
                .sessions
                .send_to_all(ServerMessage::JobUpdated { job }.to_message())
                .await;
        }
    }
}

/// Mirrors every appended log line to connected viewers.
pub async fn run_log(state: AppState, mut lines: broadcast::Receiver<String>) {
    loop {
        match lines.recv().await {
            Ok(message) => {
                state
                    .sessions
                    .send_to_all(ServerMessage::MessageLogged { message }.to_message())
                    .await;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Log fan-out dropped lines");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
