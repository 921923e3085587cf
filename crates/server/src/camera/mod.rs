//! The `/camera` video tunnel: per-viewer fan-out and the shared
//! upstream chamber-stream relay.

mod feed;
mod handler;

pub use feed::{start_sweep, stream_header, CameraFeed};
pub use handler::camera_handler;
