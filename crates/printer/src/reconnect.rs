//! Exponential-backoff reconnection for the chamber-camera stream.
//!
//! The camera socket drops whenever the printer reboots or the network
//! blips.  While viewers are still attached the relay calls
//! [`reconnect_loop`] to re-establish the upstream with growing delays,
//! giving up only when the [`CancellationToken`] fires.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::camera::{CameraConfig, FrameReader};

/// Tunable parameters for the exponential-backoff strategy.
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Re-establish the chamber stream with exponential backoff.
///
/// Returns `Some(reader)` once a connection succeeds, or `None` if the
/// `cancel` token is triggered first.
pub async fn reconnect_loop(
    camera: &CameraConfig,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<FrameReader<TcpStream>> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        tracing::info!(
            host = %camera.host,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to chamber camera",
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(host = %camera.host, "Camera reconnect cancelled");
                return None;
            }
            result = camera.connect() => {
                match result {
                    Ok(reader) => {
                        tracing::info!(host = %camera.host, attempt, "Chamber camera reconnected");
                        return Some(reader);
                    }
                    Err(e) => {
                        tracing::warn!(
                            host = %camera.host,
                            error = %e,
                            "Camera reconnect attempt {attempt} failed",
                        );
                    }
                }
            }
        }

        // Wait before the next attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_delay_doubles() {
        let config = ReconnectConfig::default();
        let d = next_delay(Duration::from_secs(1), &config);
        assert_eq!(d, Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        let d = next_delay(Duration::from_secs(8), &config);
        assert_eq!(d, Duration::from_secs(10));
    }

    #[test]
    fn custom_multiplier() {
        let config = ReconnectConfig {
            multiplier: 3.0,
            max_delay: Duration::from_secs(60),
            ..Default::default()
        };
        let d = next_delay(Duration::from_secs(2), &config);
        assert_eq!(d, Duration::from_secs(6));
    }

    #[test]
    fn full_backoff_sequence() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30, 30];

        for &expected_secs in &expected {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }

    #[tokio::test]
    async fn cancellation_token_stops_reconnect() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let camera = CameraConfig {
            host: "127.0.0.1".into(),
            port: 1,
            access_code: String::new(),
        };
        let config = ReconnectConfig::default();

        let result = reconnect_loop(&camera, &config, &cancel).await;
        assert!(result.is_none());
    }
}
