//! Events and commands crossing the printer boundary.
//!
//! These are the only types the rest of the monitor exchanges with
//! whatever component is actually speaking to the device.  Events flow
//! out of the device side; commands flow into it.

use std::sync::Arc;

use uuid::Uuid;

use printwatch_core::{Job, LogLevel, PrinterStatus, Project};

/// Something the device side observed.
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterEvent {
    /// The link to the printer came up or went down.
    ConnectionChanged { connected: bool },

    /// One full telemetry snapshot, exactly as the device reported it.
    Report { status: Arc<PrinterStatus> },

    /// The device-side log verbosity changed.
    LogLevelChanged { level: LogLevel },

    /// Plate/material metadata for a job finished loading.
    ProjectLoaded {
        /// The job the metadata belongs to.
        job_id: Uuid,
        project: Project,
    },
}

/// Something the monitor wants the device side to do.
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterCommand {
    /// Switch the chamber light on or off.
    SetLight { on: bool },

    /// Pause the running print.
    PausePrint,

    /// Resume a paused print.
    ResumePrint,

    /// Abort the running print.
    StopPrint,

    /// Change the device-side log verbosity.
    SetLogLevel { level: LogLevel },

    /// Fetch plate/material metadata for a freshly started job.
    ///
    /// The device side answers, possibly much later, with
    /// [`PrinterEvent::ProjectLoaded`].
    LoadProject { job: Job },
}
