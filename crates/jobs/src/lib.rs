//! Job lifecycle tracking.
//!
//! Derives discrete print jobs from the device's telemetry: when a print
//! starts, a [`engine::JobEngine`] allocates a job, follows it through
//! pause/resume to a terminal state, persists every change and broadcasts
//! [`events::JobEvent`]s for the rest of the system.

pub mod engine;
pub mod events;

pub use engine::JobEngine;
pub use events::JobEvent;
