use std::sync::Arc;

use printwatch_db::DbPool;
use printwatch_jobs::JobEngine;
use printwatch_printer::PrinterHandle;

use crate::camera::CameraFeed;
use crate::config::ServerConfig;
use crate::logbook::Logbook;
use crate::ws::SessionRegistry;

/// Shared application state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection pool.
    pub pool: DbPool,
    /// Server configuration loaded at startup.
    pub config: Arc<ServerConfig>,
    /// Viewer sessions on the `/api` socket.
    pub sessions: Arc<SessionRegistry>,
    /// Command/query handle to the printer link.
    pub printer: PrinterHandle,
    /// Job lifecycle engine.
    pub engine: Arc<JobEngine>,
    /// Append-only message log.
    pub logbook: Arc<Logbook>,
    /// Chamber camera fan-out.
    pub camera: Arc<CameraFeed>,
}
