#![allow(dead_code)]

//! Shared harness for the integration tests: a full application instance on
//! an ephemeral port, with the printer link's driver half handed back so
//! tests can play the device.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use printwatch_core::PrinterStatus;
use printwatch_db::DbPool;
use printwatch_jobs::JobEngine;
use printwatch_printer::{CameraConfig, PrinterDriver};
use printwatch_server::camera::CameraFeed;
use printwatch_server::config::ServerConfig;
use printwatch_server::logbook::Logbook;
use printwatch_server::state::AppState;
use printwatch_server::ws::SessionRegistry;
use printwatch_server::{fanout, pipeline, routes};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestApp {
    pub addr: SocketAddr,
    pub driver: PrinterDriver,
    pub engine: Arc<JobEngine>,
    pub state: AppState,
    _dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_camera(None).await
}

/// Builds the application the way the binary does, minus the middleware
/// stack, and serves it on an ephemeral port.
pub async fn spawn_app_with_camera(camera: Option<CameraConfig>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, camera);

    // A single in-memory connection; a pool of them would each see their
    // own empty database.
    let pool: DbPool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    printwatch_db::run_migrations(&pool).await.unwrap();

    let logbook = Arc::new(Logbook::open(&config.log_file).await.unwrap());
    let (printer, driver) = printwatch_printer::channel();
    let engine = JobEngine::new(pool.clone(), printer.clone());
    let sessions = Arc::new(SessionRegistry::new());
    let camera_feed = Arc::new(CameraFeed::new(
        printer.clone(),
        config.camera(),
        config.camera_width,
        config.camera_height,
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        sessions,
        printer: printer.clone(),
        engine: Arc::clone(&engine),
        logbook: Arc::clone(&logbook),
        camera: camera_feed,
    };

    tokio::spawn(pipeline::run(state.clone(), printer.subscribe()));
    tokio::spawn(fanout::run_jobs(state.clone(), engine.subscribe()));
    tokio::spawn(fanout::run_log(state.clone(), logbook.subscribe()));

    let app = routes::router(&config).with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr,
        driver,
        engine,
        state,
        _dir: dir,
    }
}

fn test_config(dir: &TempDir, camera: Option<CameraConfig>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "sqlite::memory:".into(),
        cors_origins: Vec::new(),
        request_timeout_secs: 30,
        printer_host: camera.as_ref().map(|c| c.host.clone()),
        printer_access_code: camera
            .as_ref()
            .map(|c| c.access_code.clone())
            .unwrap_or_default(),
        camera_port: camera.as_ref().map(|c| c.port).unwrap_or(6000),
        camera_width: 1280,
        camera_height: 720,
        heartbeat_timeout_secs: 15,
        heartbeat_sweep_secs: 5,
        log_file: dir.path().join("test.log"),
        wwwroot: dir.path().join("wwwroot"),
        project_archive: dir.path().join("projectArchive"),
        replay_file: None,
        replay_interval_ms: 1000,
    }
}

pub async fn connect_api(addr: SocketAddr) -> WsClient {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api"))
        .await
        .unwrap();
    socket
}

pub async fn connect_camera(addr: SocketAddr) -> WsClient {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/camera"))
        .await
        .unwrap();
    socket
}

pub async fn send_json(client: &mut WsClient, payload: Value) {
    client
        .send(WsMessage::Text(payload.to_string()))
        .await
        .unwrap();
}

/// Next text frame as JSON, skipping protocol-level frames.
pub async fn recv_json(client: &mut WsClient) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a message")
            .expect("socket closed")
            .unwrap();
        match message {
            WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Next binary frame, skipping protocol-level frames.
pub async fn recv_binary(client: &mut WsClient) -> Vec<u8> {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        match message {
            WsMessage::Binary(payload) => return payload,
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Collects every text frame that arrives within `window` of the last one.
pub async fn drain_for(client: &mut WsClient, window: Duration) -> Vec<Value> {
    let mut messages = Vec::new();
    loop {
        match tokio::time::timeout(window, client.next()).await {
            Ok(Some(Ok(WsMessage::Text(text)))) => {
                messages.push(serde_json::from_str(&text).unwrap());
            }
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => panic!("socket error: {e}"),
            Ok(None) => panic!("socket closed"),
            Err(_) => return messages,
        }
    }
}

/// Asserts that no text frame arrives within a short grace period.
pub async fn expect_silence(client: &mut WsClient) {
    let result = tokio::time::timeout(Duration::from_millis(250), client.next()).await;
    assert!(result.is_err(), "expected no traffic, got {result:?}");
}

/// First collected message of the given `Type`.
pub fn find<'a>(messages: &'a [Value], type_name: &str) -> &'a Value {
    messages
        .iter()
        .find(|m| m["Type"] == type_name)
        .unwrap_or_else(|| panic!("no {type_name} message in {messages:?}"))
}

pub fn find_all<'a>(messages: &'a [Value], type_name: &str) -> Vec<&'a Value> {
    messages.iter().filter(|m| m["Type"] == type_name).collect()
}

pub fn idle() -> PrinterStatus {
    status_from(json!({"gcode_state": "IDLE"}))
}

pub fn printing(file: &str, percent: u32) -> PrinterStatus {
    status_from(json!({
        "gcode_state": "RUNNING",
        "gcode_file": format!("/data/Metadata/{file}.gcode"),
        "subtask_name": file,
        "mc_percent": percent,
    }))
}

pub fn finished(file: &str, print_error: u32) -> PrinterStatus {
    status_from(json!({
        "gcode_state": "FINISH",
        "gcode_file": format!("/data/Metadata/{file}.gcode"),
        "subtask_name": file,
        "mc_percent": 100,
        "print_error": print_error,
    }))
}

pub fn streaming_status() -> PrinterStatus {
    status_from(json!({
        "gcode_state": "IDLE",
        "ipcam": {"rtsp_url": "rtsps://printer.local/streaming/live/1"},
    }))
}

fn status_from(value: Value) -> PrinterStatus {
    serde_json::from_value(value).unwrap()
}
