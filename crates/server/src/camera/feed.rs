//! Chamber camera fan-out.
//!
//! One upstream TCP connection to the printer's camera service is shared by
//! every `/camera` WebSocket viewer. The upstream is opened lazily when the
//! first viewer attaches and torn down when the last one leaves, whether it
//! left cleanly or went silent.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use printwatch_printer::reconnect::reconnect_loop;
use printwatch_printer::{CameraConfig, PrinterHandle, ReconnectConfig};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ws::SessionRegistry;

/// Magic bytes identifying the stream format to the frontend player.
const STREAM_MAGIC: &[u8; 4] = b"jsmp";

/// Builds the 8-byte greeting each viewer receives before any frame:
/// the magic followed by the big-endian pixel dimensions.
pub fn stream_header(width: u16, height: u16) -> [u8; 8] {
    let mut header = [0u8; 8];
    header[..4].copy_from_slice(STREAM_MAGIC);
    header[4..6].copy_from_slice(&width.to_be_bytes());
    header[6..8].copy_from_slice(&height.to_be_bytes());
    header
}

struct UpstreamRelay {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl UpstreamRelay {
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(error) = self.task.await {
            tracing::debug!(%error, "Camera relay ended abnormally");
        }
        tracing::info!("Chamber stream relay stopped");
    }
}

pub struct CameraFeed {
    viewers: Arc<SessionRegistry>,
    header: [u8; 8],
    printer: PrinterHandle,
    camera: Option<CameraConfig>,
    upstream: Mutex<Option<UpstreamRelay>>,
}

impl CameraFeed {
    pub fn new(
        printer: PrinterHandle,
        camera: Option<CameraConfig>,
        width: u16,
        height: u16,
    ) -> Self {
        Self {
            viewers: Arc::new(SessionRegistry::new()),
            header: stream_header(width, height),
            printer,
            camera,
            upstream: Mutex::new(None),
        }
    }

    /// Registers a viewer. The stream header is queued as its first message,
    /// then the shared upstream is started if this is the first viewer.
    pub async fn attach(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let greeting = Message::Binary(Bytes::copy_from_slice(&self.header));
        let rx = self.viewers.add_with_greeting(conn_id, greeting).await;
        self.ensure_upstream().await;
        rx
    }

    /// Removes a viewer and tears the upstream down if it was the last one.
    pub async fn detach(&self, conn_id: &str) {
        self.viewers.remove(conn_id).await;
        self.close_if_idle().await;
    }

    /// Marks a viewer as alive.
    pub async fn touch(&self, conn_id: &str) {
        self.viewers.touch(conn_id).await;
    }

    /// Number of attached viewers.
    pub async fn viewer_count(&self) -> usize {
        self.viewers.count().await
    }

    /// Whether the upstream relay is currently running.
    pub async fn is_streaming(&self) -> bool {
        self.upstream.lock().await.is_some()
    }

    /// Closes the upstream when no viewers remain.
    ///
    /// The viewer count is read under the upstream lock: an attach racing
    /// this call either has its viewer registered and counted here, or
    /// finds the slot empty afterwards and dials a fresh relay.
    pub async fn close_if_idle(&self) {
        let mut upstream = self.upstream.lock().await;
        if self.viewers.count().await > 0 {
            return;
        }
        if let Some(relay) = upstream.take() {
            relay.stop().await;
        }
    }

    /// Stops the relay and all viewer sessions. Used during shutdown.
    pub async fn shutdown(&self) {
        self.close_upstream().await;
        self.viewers.shutdown_all().await;
    }

    async fn ensure_upstream(&self) {
        let mut upstream = self.upstream.lock().await;
        if upstream.is_some() {
            return;
        }
        let Some(camera) = self.camera.clone() else {
            tracing::debug!("No printer host configured; viewers get the header only");
            return;
        };
        // The printer advertises its stream endpoint in telemetry; without
        // that there is nothing to connect to yet.
        let Some(status) = self.printer.status().await else {
            tracing::info!("No telemetry snapshot yet; chamber stream stays down");
            return;
        };
        if status.stream_locator().is_empty() {
            tracing::info!("Printer advertises no chamber stream");
            return;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(relay(camera, Arc::clone(&self.viewers), cancel.clone()));
        *upstream = Some(UpstreamRelay { cancel, task });
        tracing::info!("Chamber stream relay started");
    }

    /// Tears down the upstream unconditionally. Taking the relay out of the
    /// option makes this idempotent under concurrent callers.
    async fn close_upstream(&self) {
        let relay = self.upstream.lock().await.take();
        if let Some(relay) = relay {
            relay.stop().await;
        }
    }
}

/// Spawns the heartbeat sweep for camera viewers. Unlike the `/api` sweep,
/// losing the last viewer here also tears down the upstream.
pub fn start_sweep(
    feed: Arc<CameraFeed>,
    interval: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            feed.viewers.ping_all().await;
            let expired = feed.viewers.expire(timeout).await;
            for conn_id in &expired {
                tracing::info!(conn_id = %conn_id, "Camera viewer heartbeat lost");
            }
            if !expired.is_empty() {
                feed.close_if_idle().await;
            }
        }
    })
}

/// Pulls frames from the printer and fans them out to every viewer,
/// reconnecting with backoff until cancelled.
async fn relay(camera: CameraConfig, viewers: Arc<SessionRegistry>, cancel: CancellationToken) {
    let backoff = ReconnectConfig::default();
    'connect: loop {
        let mut reader = tokio::select! {
            _ = cancel.cancelled() => return,
            result = camera.connect() => match result {
                Ok(reader) => reader,
                Err(error) => {
                    tracing::warn!(host = %camera.host, %error, "Chamber camera connect failed");
                    match reconnect_loop(&camera, &backoff, &cancel).await {
                        Some(reader) => reader,
                        None => return,
                    }
                }
            }
        };
        tracing::info!(host = %camera.host, "Chamber stream connected");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                frame = reader.next_frame() => match frame {
                    Ok(frame) => viewers.send_binary_to_all(Bytes::from(frame)).await,
                    Err(error) => {
                        tracing::warn!(host = %camera.host, %error, "Chamber stream lost");
                        continue 'connect;
                    }
                }
            }
        }
    }
}
