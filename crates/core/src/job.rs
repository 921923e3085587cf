//! Job records.
//!
//! A [`Job`] is one tracked print, from detected start to terminal state.
//! Serialization is PascalCase because these records go to viewers verbatim
//! (the viewer protocol predates this implementation and is kept stable).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Timestamp;

/// One tracked print job.
///
/// Invariants, enforced by the lifecycle engine as the sole writer:
/// `stop_time` is `None` exactly while `state` is non-terminal; `id` never
/// changes after creation; at most one job is non-terminal at a time;
/// terminal jobs are immutable apart from `comment` and `recipient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    pub id: Uuid,
    pub start_time: Timestamp,
    pub stop_time: Option<Timestamp>,
    /// Human-facing print name (the sliced project name).
    pub file_name: String,
    /// Device-side path of the file being printed.
    pub project_archive_path: String,
    pub state: JobState,
    /// Plate/material metadata; attached once after the job starts and
    /// immutable from then on.
    pub project: Option<Project>,
    pub comment: String,
    pub recipient: String,
}

/// Lifecycle states. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Started,
    Paused,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Started => "Started",
            Self::Paused => "Paused",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = UnknownJobState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Idle" => Ok(Self::Idle),
            "Started" => Ok(Self::Started),
            "Paused" => Ok(Self::Paused),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            other => Err(UnknownJobState(other.to_string())),
        }
    }
}

/// Error for an unrecognized persisted state string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownJobState(pub String);

impl std::fmt::Display for UnknownJobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown job state {:?}", self.0)
    }
}

impl std::error::Error for UnknownJobState {}

/// Plate/material metadata resolved from the sliced project file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Project {
    pub settings_name: String,
    pub plate_index: i64,
    pub plate_name: String,
    pub thumbnail_file: String,
    /// Total filament weight in grams.
    pub total_weight: f64,
    pub filaments: Vec<Filament>,
}

/// One filament used by a plate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Filament {
    pub tray_id: i64,
    #[serde(rename = "Type")]
    pub material: String,
    pub colour: String,
    /// Used length in millimetres.
    pub used_length: f64,
    /// Used weight in grams.
    pub used_weight: f64,
    pub brand_family: String,
    pub brand_family_id: String,
    pub brand_id: String,
    #[serde(rename = "IsBBL")]
    pub is_bbl: bool,
    pub uuid: String,
}
