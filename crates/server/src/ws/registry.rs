use std::collections::HashMap;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;

/// Sender half of a session's outbound message channel.
pub type SessionSender = mpsc::UnboundedSender<Message>;

/// A single connected WebSocket viewer.
pub struct Session {
    pub sender: SessionSender,
    /// Last time the viewer showed signs of life (any inbound frame).
    pub last_seen: Instant,
}

/// Tracks live WebSocket sessions and routes outbound messages to them.
///
/// Each session gets an unbounded channel; the socket task forwards the
/// receiver half to the sink, so callers here never block on a slow client.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a session and returns the receiver half of its outbound
    /// channel.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            sender: tx,
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(conn_id, session);
        rx
    }

    /// Registers a session whose first outbound message is `greeting`.
    ///
    /// The greeting is queued before the session becomes visible to
    /// broadcasts, so no broadcast frame can arrive ahead of it.
    pub async fn add_with_greeting(
        &self,
        conn_id: String,
        greeting: Message,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(greeting);
        let session = Session {
            sender: tx,
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(conn_id, session);
        rx
    }

    /// Marks a session as alive.
    pub async fn touch(&self, conn_id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(conn_id) {
            session.last_seen = Instant::now();
        }
    }

    /// Removes a session.
    pub async fn remove(&self, conn_id: &str) {
        self.sessions.write().await.remove(conn_id);
    }

    /// Number of live sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Sends a message to a single session.
    pub async fn send_to(&self, conn_id: &str, message: Message) {
        if let Some(session) = self.sessions.read().await.get(conn_id) {
            let _ = session.sender.send(message);
        }
    }

    /// Sends a message to every session.
    pub async fn send_to_all(&self, message: Message) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            // A send failure means the socket task is gone; the disconnect
            // cleanup will remove the entry shortly.
            let _ = session.sender.send(message.clone());
        }
    }

    /// Sends a binary frame to every session.
    pub async fn send_binary_to_all(&self, payload: Bytes) {
        self.send_to_all(Message::Binary(payload)).await;
    }

    /// Sends a protocol-level ping to every session.
    pub async fn ping_all(&self) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            let _ = session.sender.send(Message::Ping(Bytes::new()));
        }
    }

    /// Drops every session that has been silent for at least `timeout`,
    /// returning their ids.
    pub async fn expire(&self, timeout: Duration) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| now.duration_since(session.last_seen) >= timeout)
            .map(|(conn_id, _)| conn_id.clone())
            .collect();
        for conn_id in &stale {
            if let Some(session) = sessions.remove(conn_id) {
                let _ = session.sender.send(Message::Close(None));
            }
        }
        stale
    }

    /// Closes every session. Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values() {
            let _ = session.sender.send(Message::Close(None));
        }
        let count = sessions.len();
        sessions.clear();
        if count > 0 {
            tracing::info!(count, "Closed all WebSocket sessions");
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_and_remove_track_the_count() {
        let registry = SessionRegistry::new();
        let _rx = registry.add("a".into()).await;
        let _rx2 = registry.add("b".into()).await;
        assert_eq!(registry.count().await, 2);

        registry.remove("a").await;
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn broadcast_still_reaches_healthy_sessions_past_a_severed_one() {
        let registry = SessionRegistry::new();
        let severed = registry.add("severed".into()).await;
        let mut healthy = registry.add("healthy".into()).await;
        drop(severed);

        registry
            .send_to_all(Message::Text("hello".into()))
            .await;

        let received = healthy.try_recv().unwrap();
        assert_eq!(received, Message::Text("hello".into()));
    }

    #[tokio::test]
    async fn greeting_arrives_before_any_broadcast() {
        let registry = SessionRegistry::new();
        let mut rx = registry
            .add_with_greeting("a".into(), Message::Binary(Bytes::from_static(b"first")))
            .await;
        registry.send_to_all(Message::Text("second".into())).await;

        assert_eq!(
            rx.try_recv().unwrap(),
            Message::Binary(Bytes::from_static(b"first"))
        );
        assert_eq!(rx.try_recv().unwrap(), Message::Text("second".into()));
    }

    #[tokio::test]
    async fn send_to_targets_one_session_only() {
        let registry = SessionRegistry::new();
        let mut a = registry.add("a".into()).await;
        let mut b = registry.add("b".into()).await;

        registry.send_to("a", Message::Text("only a".into())).await;

        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn expire_drops_only_silent_sessions() {
        let registry = SessionRegistry::new();
        let mut stale = registry.add("stale".into()).await;
        tokio::time::advance(Duration::from_secs(10)).await;
        let mut fresh = registry.add("fresh".into()).await;
        tokio::time::advance(Duration::from_secs(6)).await;

        // "stale" has been silent for 16s, "fresh" for 6s.
        let expired = registry.expire(Duration::from_secs(15)).await;

        assert_eq!(expired, vec!["stale".to_string()]);
        assert_eq!(registry.count().await, 1);
        assert_eq!(stale.try_recv().unwrap(), Message::Close(None));
        assert!(fresh.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn touch_resets_the_silence_clock() {
        let registry = SessionRegistry::new();
        let _rx = registry.add("a".into()).await;
        tokio::time::advance(Duration::from_secs(10)).await;
        registry.touch("a").await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let expired = registry.expire(Duration::from_secs(15)).await;

        assert!(expired.is_empty());
        assert_eq!(registry.count().await, 1);
    }
}
