//! The `/api` WebSocket surface: session registry, wire envelopes,
//! request dispatch and the heartbeat sweep.

mod handler;
mod heartbeat;
pub mod messages;
pub mod registry;

pub use handler::ws_handler;
pub use heartbeat::start_sweep;
pub use registry::SessionRegistry;
