//! Shared data model and pure decoders for the printer monitor.
//!
//! Everything in this crate is side-effect free: the telemetry snapshot
//! model ([`PrinterStatus`]), the snapshot differ ([`diff::diff_snapshots`]),
//! the AMS and home-flag codecs, and the [`Job`] record that the lifecycle
//! engine persists. No I/O happens here.

pub mod ams;
pub mod diff;
pub mod home_flag;
pub mod job;
pub mod log_level;
pub mod status;

pub use diff::{diff_snapshots, FieldChange};
pub use home_flag::{HomeFlag, SdCardState};
pub use job::{Filament, Job, JobState, Project};
pub use log_level::LogLevel;
pub use status::{GcodeState, IpCam, PrinterStatus};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
