use std::sync::Arc;
use std::time::Duration;

use super::registry::SessionRegistry;

/// Spawns the background task that pings all viewer sessions and drops the
/// ones that stayed silent past `timeout`.
pub fn start_sweep(
    sessions: Arc<SessionRegistry>,
    interval: Duration,
    timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            sessions.ping_all().await;
            for conn_id in sessions.expire(timeout).await {
                tracing::info!(conn_id = %conn_id, "Viewer heartbeat lost");
            }
            let count = sessions.count().await;
            tracing::debug!(count, "Viewer heartbeat sweep");
        }
    })
}
