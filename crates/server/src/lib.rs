//! Library surface of the printwatch backend.
//!
//! Everything the binary wires together lives here so integration tests
//! and the binary entrypoint can both access them.

pub mod camera;
pub mod config;
pub mod fanout;
pub mod logbook;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod ws;
