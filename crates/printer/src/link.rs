//! The channel pair connecting the monitor to the device side.
//!
//! [`channel`] yields a [`PrinterHandle`] for the monitor (send commands,
//! read cached state, subscribe to events) and a [`PrinterDriver`] for
//! whatever drives the actual device connection (drain commands, publish
//! events).  The driver updates the shared cache before broadcasting, so
//! a subscriber that reacts to an event always sees a cache at least as
//! new as the event itself.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use printwatch_core::{Job, LogLevel, PrinterStatus, Project};

use crate::events::{PrinterCommand, PrinterEvent};

/// Buffered events per subscriber before a slow one starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Last-known device state, shared between handle and driver.
#[derive(Debug, Default)]
struct LinkState {
    connected: bool,
    status: Option<Arc<PrinterStatus>>,
    log_level: LogLevel,
}

/// Create a connected handle/driver pair.
pub fn channel() -> (PrinterHandle, PrinterDriver) {
    let state = Arc::new(RwLock::new(LinkState::default()));
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let handle = PrinterHandle {
        state: Arc::clone(&state),
        events: events.clone(),
        commands: command_tx,
    };
    let driver = PrinterDriver {
        state,
        events,
        commands: command_rx,
    };
    (handle, driver)
}

/// The monitor's side of the device link.
///
/// Cheap to clone; every clone talks to the same driver.
#[derive(Debug, Clone)]
pub struct PrinterHandle {
    state: Arc<RwLock<LinkState>>,
    events: broadcast::Sender<PrinterEvent>,
    commands: mpsc::UnboundedSender<PrinterCommand>,
}

impl PrinterHandle {
    /// Subscribe to device events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<PrinterEvent> {
        self.events.subscribe()
    }

    /// Whether the device link is currently up.
    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    /// The most recent telemetry snapshot, if any was ever received.
    ///
    /// Kept across disconnects: a viewer asking for state while the
    /// printer is offline still gets the last thing we knew.
    pub async fn status(&self) -> Option<Arc<PrinterStatus>> {
        self.state.read().await.status.clone()
    }

    /// The device-side log verbosity last reported by the driver.
    pub async fn log_level(&self) -> LogLevel {
        self.state.read().await.log_level
    }

    pub fn set_light(&self, on: bool) {
        self.send(PrinterCommand::SetLight { on });
    }

    pub fn pause_print(&self) {
        self.send(PrinterCommand::PausePrint);
    }

    pub fn resume_print(&self) {
        self.send(PrinterCommand::ResumePrint);
    }

    pub fn stop_print(&self) {
        self.send(PrinterCommand::StopPrint);
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.send(PrinterCommand::SetLogLevel { level });
    }

    /// Ask the device side to fetch plate/material metadata for `job`.
    pub fn load_project(&self, job: Job) {
        self.send(PrinterCommand::LoadProject { job });
    }

    /// Commands are fire-and-forget: with no driver attached the monitor
    /// runs in disconnected mode and commands go nowhere.
    fn send(&self, command: PrinterCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("No printer driver attached, dropping command");
        }
    }
}

/// The device side of the link.
///
/// A protocol client (or the replay source) owns this, drains commands
/// from it and publishes what it observes.
#[derive(Debug)]
pub struct PrinterDriver {
    state: Arc<RwLock<LinkState>>,
    events: broadcast::Sender<PrinterEvent>,
    commands: mpsc::UnboundedReceiver<PrinterCommand>,
}

impl PrinterDriver {
    /// Next command from the monitor, or `None` once every handle is gone.
    pub async fn next_command(&mut self) -> Option<PrinterCommand> {
        self.commands.recv().await
    }

    pub async fn publish_connection(&self, connected: bool) {
        self.state.write().await.connected = connected;
        self.broadcast(PrinterEvent::ConnectionChanged { connected });
    }

    pub async fn publish_report(&self, status: PrinterStatus) {
        let status = Arc::new(status);
        self.state.write().await.status = Some(Arc::clone(&status));
        self.broadcast(PrinterEvent::Report { status });
    }

    pub async fn publish_log_level(&self, level: LogLevel) {
        self.state.write().await.log_level = level;
        self.broadcast(PrinterEvent::LogLevelChanged { level });
    }

    pub fn publish_project_loaded(&self, job_id: Uuid, project: Project) {
        self.broadcast(PrinterEvent::ProjectLoaded { job_id, project });
    }

    /// A broadcast with no subscribers is not an error.
    fn broadcast(&self, event: PrinterEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn report_with_state(gcode_state: &str) -> PrinterStatus {
        PrinterStatus {
            gcode_state_raw: gcode_state.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn commands_reach_the_driver_in_order() {
        let (handle, mut driver) = channel();

        handle.set_light(true);
        handle.pause_print();
        handle.set_log_level(LogLevel::Debug);

        assert_matches!(
            driver.next_command().await,
            Some(PrinterCommand::SetLight { on: true })
        );
        assert_matches!(driver.next_command().await, Some(PrinterCommand::PausePrint));
        assert_matches!(
            driver.next_command().await,
            Some(PrinterCommand::SetLogLevel {
                level: LogLevel::Debug
            })
        );
    }

    #[tokio::test]
    async fn commands_without_a_driver_are_dropped() {
        let (handle, driver) = channel();
        drop(driver);

        // Must not panic or block.
        handle.stop_print();
        handle.resume_print();
    }

    #[tokio::test]
    async fn report_updates_cache_and_broadcasts() {
        let (handle, driver) = channel();
        let mut events = handle.subscribe();

        driver.publish_report(report_with_state("RUNNING")).await;

        let event = events.recv().await.unwrap();
        assert_matches!(event, PrinterEvent::Report { status } if status.gcode_state_raw == "RUNNING");

        let cached = handle.status().await.expect("cached snapshot");
        assert_eq!(cached.gcode_state_raw, "RUNNING");
    }

    #[tokio::test]
    async fn connection_flag_tracks_publishes() {
        let (handle, driver) = channel();
        assert!(!handle.is_connected().await);

        driver.publish_connection(true).await;
        assert!(handle.is_connected().await);

        driver.publish_connection(false).await;
        assert!(!handle.is_connected().await);

        // Snapshot survives the disconnect.
        driver.publish_report(report_with_state("IDLE")).await;
        driver.publish_connection(false).await;
        assert!(handle.status().await.is_some());
    }

    #[tokio::test]
    async fn log_level_is_cached_for_late_readers() {
        let (handle, driver) = channel();
        assert_eq!(handle.log_level().await, LogLevel::Information);

        driver.publish_log_level(LogLevel::Trace).await;
        assert_eq!(handle.log_level().await, LogLevel::Trace);
    }

    #[tokio::test]
    async fn project_loaded_reaches_subscribers() {
        let (handle, driver) = channel();
        let mut events = handle.subscribe();
        let job_id = Uuid::new_v4();

        driver.publish_project_loaded(job_id, Project::default());

        assert_matches!(
            events.recv().await,
            Ok(PrinterEvent::ProjectLoaded { job_id: id, .. }) if id == job_id
        );
    }
}
