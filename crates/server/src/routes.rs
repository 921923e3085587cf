use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::services::{ServeDir, ServeFile};

use crate::camera;
use crate::config::ServerConfig;
use crate::state::AppState;
use crate::ws;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    db_healthy: bool,
}

/// Liveness/readiness probe.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = printwatch_db::health_check(&state.pool).await.is_ok();
    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
    })
}

/// Builds the route table: probe, the two WebSocket endpoints, downloaded
/// project archives, and the single-page frontend with its client-side
/// routing fallback.
pub fn router(config: &ServerConfig) -> Router<AppState> {
    let spa = ServeDir::new(&config.wwwroot)
        .fallback(ServeFile::new(config.wwwroot.join("index.html")));

    Router::new()
        .route("/health", get(health_check))
        .route("/api", get(ws::ws_handler))
        .route("/camera", get(camera::camera_handler))
        .nest_service("/projectArchive", ServeDir::new(&config.project_archive))
        .fallback_service(spa)
}
