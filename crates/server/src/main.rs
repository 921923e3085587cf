use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use printwatch_jobs::JobEngine;
use printwatch_server::camera::{self, CameraFeed};
use printwatch_server::config::ServerConfig;
use printwatch_server::logbook::Logbook;
use printwatch_server::state::AppState;
use printwatch_server::ws::{self, SessionRegistry};
use printwatch_server::{fanout, pipeline, routes};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "printwatch=debug,tower_http=debug".into()),
        )
        .with(fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(?config, "Loaded server configuration");

    let pool = printwatch_db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    printwatch_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    printwatch_db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Database ready");

    let logbook = Arc::new(
        Logbook::open(&config.log_file)
            .await
            .expect("Failed to open the message log"),
    );

    let (printer, driver) = printwatch_printer::channel();
    let engine = JobEngine::new(pool.clone(), printer.clone());
    engine
        .resume_pending()
        .await
        .expect("Failed to check for unfinished jobs");

    let sessions = Arc::new(SessionRegistry::new());
    let camera_feed = Arc::new(CameraFeed::new(
        printer.clone(),
        config.camera(),
        config.camera_width,
        config.camera_height,
    ));

    let cors = build_cors_layer(&config);
    let app_routes = routes::router(&config);

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        sessions: Arc::clone(&sessions),
        printer: printer.clone(),
        engine: Arc::clone(&engine),
        logbook: Arc::clone(&logbook),
        camera: Arc::clone(&camera_feed),
    };

    let pipeline_task = tokio::spawn(pipeline::run(state.clone(), printer.subscribe()));
    let jobs_task = tokio::spawn(fanout::run_jobs(state.clone(), engine.subscribe()));
    let log_task = tokio::spawn(fanout::run_log(state.clone(), logbook.subscribe()));

    let hub_sweep = ws::start_sweep(
        Arc::clone(&sessions),
        config.heartbeat_sweep(),
        config.heartbeat_timeout(),
    );
    let camera_sweep = camera::start_sweep(
        Arc::clone(&camera_feed),
        config.heartbeat_sweep(),
        config.heartbeat_timeout(),
    );

    // Feed the link from a recording when one is configured; otherwise park
    // the driver so the link stays open in disconnected mode.
    let driver_task = match config.replay() {
        Some(replay) => tokio::spawn(async move {
            if let Err(error) = printwatch_printer::replay::run(driver, replay).await {
                tracing::error!(%error, "Telemetry replay failed");
            }
        }),
        None => tokio::spawn(async move {
            let mut driver = driver;
            while let Some(command) = driver.next_command().await {
                tracing::debug!(?command, "No printer attached; dropping command");
            }
        }),
    };

    let request_id_header = HeaderName::from_static("x-request-id");
    let app = app_routes
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Shutting down");

    // Stop the camera relay and its viewers first; frames are the highest
    // volume traffic.
    camera_feed.shutdown().await;

    // Close viewer sessions so their socket tasks wind down.
    sessions.shutdown_all().await;

    // The background loops hold state clones and never exit on their own.
    hub_sweep.abort();
    camera_sweep.abort();
    driver_task.abort();
    pipeline_task.abort();
    jobs_task.abort();
    log_task.abort();

    tracing::info!("Graceful shutdown complete");
}

/// Resolves when the process receives Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

/// Builds the CORS layer from the configured origins.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
