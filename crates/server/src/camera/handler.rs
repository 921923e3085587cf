use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use super::feed::CameraFeed;
use crate::state::AppState;

/// Upgrades `/camera` requests to a stream-viewer session.
pub async fn camera_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.camera))
}

async fn handle_socket(socket: WebSocket, feed: Arc<CameraFeed>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Camera viewer connected");

    let mut rx = feed.attach(conn_id.clone()).await;
    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = sink.send(message).await {
                tracing::debug!(error = %e, "Camera send failed");
                break;
            }
        }
    });

    // Viewers send nothing meaningful; pongs and stray frames just prove
    // they are alive.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => feed.touch(&conn_id).await,
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "Camera receive error");
                break;
            }
        }
    }

    feed.detach(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Camera viewer disconnected");
}
