//! Printer-side plumbing for the monitor.
//!
//! Provides the command/event channel pair that decouples the rest of the
//! system from whatever is actually talking to the printer, the chamber
//! camera stream protocol, and a file-based replay source for running the
//! monitor without hardware.

pub mod camera;
pub mod events;
pub mod link;
pub mod reconnect;
pub mod replay;

pub use camera::{CameraConfig, CameraError, FrameReader};
pub use events::{PrinterCommand, PrinterEvent};
pub use link::{channel, PrinterDriver, PrinterHandle};
pub use reconnect::ReconnectConfig;
pub use replay::ReplayConfig;
