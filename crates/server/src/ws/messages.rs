use axum::extract::ws::Message;
use printwatch_core::{Job, LogLevel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a job in an edit request. Clients send the whole job object
/// back; only the id matters here, the rest is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobRef {
    #[serde(rename = "Id")]
    pub id: Uuid,
}

/// Requests a viewer can send over the `/api` socket.
///
/// The `Type` field selects the variant; field names follow the frontend's
/// JSON casing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "Type")]
pub enum ClientRequest {
    /// Replay the full backend state to the requesting viewer.
    GetState,
    /// Toggle the chamber light.
    SetLight {
        #[serde(rename = "isOn")]
        is_on: bool,
    },
    /// Ask for the device-side log verbosity.
    GetPrinterLogLevel,
    /// Change the device-side log verbosity.
    SetPrinterLogLevel {
        #[serde(rename = "Level")]
        level: LogLevel,
    },
    /// Replay the persisted message log to the requesting viewer.
    RequestFullLog,
    /// Pause the running print.
    RequestJobPause,
    /// Resume a paused print.
    RequestJobResume,
    /// Abort the running print.
    RequestJobStop,
    /// Fetch the stored job history.
    RequestJobHistory,
    /// Attach a comment to a job.
    SaveJobComment {
        #[serde(rename = "Job")]
        job: JobRef,
        #[serde(rename = "NewComment")]
        new_comment: String,
    },
    /// Record who a print is for.
    SaveJobRecipient {
        #[serde(rename = "Job")]
        job: JobRef,
        #[serde(rename = "NewRecipient")]
        new_recipient: String,
    },
    /// Liveness signal; carries no payload.
    KeepAlive,
}

/// Messages the backend pushes to viewers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type")]
pub enum ServerMessage {
    /// Latest raw telemetry snapshot.
    Status {
        #[serde(rename = "Status")]
        status: serde_json::Value,
    },
    /// Whether the backend currently has a live printer feed.
    PrinterConnectionStatus {
        #[serde(rename = "IsConnected")]
        is_connected: bool,
    },
    /// Device-side log verbosity.
    PrinterLogLevel {
        #[serde(rename = "Level")]
        level: LogLevel,
    },
    /// One line of the message log.
    MessageLogged {
        #[serde(rename = "Message")]
        message: String,
    },
    /// The job being tracked right now, if any.
    CurrentJob {
        #[serde(rename = "Job")]
        job: Option<Job>,
    },
    /// Full job history, newest first.
    JobHistory {
        #[serde(rename = "Jobs")]
        jobs: Vec<Job>,
    },
    /// A single job changed (lifecycle or edit).
    JobUpdated {
        #[serde(rename = "Job")]
        job: Job,
    },
}

impl ServerMessage {
    /// Encodes the message as a WebSocket text frame.
    pub fn to_message(&self) -> Message {
        match serde_json::to_string(self) {
            Ok(text) => Message::Text(text.into()),
            // These envelopes always serialize; keep the socket alive if
            // that ever stops being true.
            Err(error) => {
                tracing::error!(%error, "Failed to encode server message");
                Message::Text(String::new().into())
            }
        }
    }
}
