use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::state::AppState;
use crate::ws::messages::{ClientRequest, ServerMessage};

/// Upgrades `/api` requests to a WebSocket session.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drives a single viewer session until it disconnects.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Viewer connected");

    let mut rx = state.sessions.add(conn_id.clone()).await;
    let (mut sink, mut stream) = socket.split();

    // Forward queued outbound messages to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = sink.send(message).await {
                tracing::debug!(error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Any inbound frame counts as a liveness signal.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                state.sessions.touch(&conn_id).await;
            }
            Ok(Message::Text(text)) => {
                state.sessions.touch(&conn_id).await;
                match serde_json::from_str::<ClientRequest>(&text) {
                    Ok(request) => dispatch(&state, &conn_id, request).await,
                    Err(error) => {
                        tracing::debug!(conn_id = %conn_id, %error, "Ignoring malformed viewer message");
                    }
                }
            }
            Ok(_) => {
                state.sessions.touch(&conn_id).await;
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.sessions.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Viewer disconnected");
}

/// Routes one decoded viewer request.
async fn dispatch(state: &AppState, conn_id: &str, request: ClientRequest) {
    match request {
        ClientRequest::GetState => send_state(state, conn_id).await,
        ClientRequest::SetLight { is_on } => state.printer.set_light(is_on),
        ClientRequest::GetPrinterLogLevel => {
            let level = state.printer.log_level().await;
            state
                .sessions
                .send_to(conn_id, ServerMessage::PrinterLogLevel { level }.to_message())
                .await;
        }
        ClientRequest::SetPrinterLogLevel { level } => state.printer.set_log_level(level),
        ClientRequest::RequestFullLog => match state.logbook.full_log().await {
            Ok(lines) => {
                for message in lines {
                    state
                        .sessions
                        .send_to(conn_id, ServerMessage::MessageLogged { message }.to_message())
                        .await;
                }
            }
            Err(error) => {
                tracing::warn!(conn_id = %conn_id, %error, "Failed to read the message log");
            }
        },
        ClientRequest::RequestJobPause => state.printer.pause_print(),
        ClientRequest::RequestJobResume => state.printer.resume_print(),
        ClientRequest::RequestJobStop => state.printer.stop_print(),
        ClientRequest::RequestJobHistory => match state.engine.history().await {
            Ok(jobs) => {
                state
                    .sessions
                    .send_to(conn_id, ServerMessage::JobHistory { jobs }.to_message())
                    .await;
            }
            Err(error) => {
                tracing::warn!(conn_id = %conn_id, %error, "Failed to load job history");
            }
        },
        ClientRequest::SaveJobComment { job, new_comment } => {
            match state.engine.save_comment(job.id, &new_comment).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(id = %job.id, "Comment edit for an unknown job ignored");
                }
                Err(error) => tracing::warn!(id = %job.id, %error, "Failed to save comment"),
            }
        }
        ClientRequest::SaveJobRecipient { job, new_recipient } => {
            match state.engine.save_recipient(job.id, &new_recipient).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(id = %job.id, "Recipient edit for an unknown job ignored");
                }
                Err(error) => tracing::warn!(id = %job.id, %error, "Failed to save recipient"),
            }
        }
        // The surrounding loop already touched the session.
        ClientRequest::KeepAlive => {}
    }
}

/// Replays the whole backend state to one viewer, in the order the frontend
/// expects: connection flag, latest snapshot (when one exists), device log
/// level, then the current job.
async fn send_state(state: &AppState, conn_id: &str) {
    let connected = state.printer.is_connected().await;
    state
        .sessions
        .send_to(
            conn_id,
            ServerMessage::PrinterConnectionStatus {
                is_connected: connected,
            }
            .to_message(),
        )
        .await;

    if let Some(status) = state.printer.status().await {
        match serde_json::to_value(&*status) {
            Ok(snapshot) => {
                state
                    .sessions
                    .send_to(conn_id, ServerMessage::Status { status: snapshot }.to_message())
                    .await;
            }
            Err(error) => tracing::error!(%error, "Failed to encode the status snapshot"),
        }
    }

    let level = state.printer.log_level().await;
    state
        .sessions
        .send_to(conn_id, ServerMessage::PrinterLogLevel { level }.to_message())
        .await;

    let job = state.engine.current_job().await;
    state
        .sessions
        .send_to(conn_id, ServerMessage::CurrentJob { job }.to_message())
        .await;
}
