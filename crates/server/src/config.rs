use std::path::PathBuf;
use std::time::Duration;

use printwatch_printer::{CameraConfig, ReplayConfig};

/// Runtime configuration for the monitor backend.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to. Defaults to `0.0.0.0`.
    pub host: String,
    /// Port the HTTP server listens on. Defaults to `3000`.
    pub port: u16,
    /// SQLite connection string for the job store. Defaults to `sqlite:printwatch.db`.
    pub database_url: String,
    /// Allowed CORS origins, comma separated. Defaults to the Vite dev server.
    pub cors_origins: Vec<String>,
    /// Request timeout in seconds. Defaults to `30`.
    pub request_timeout_secs: u64,
    /// Hostname or IP of the printer on the LAN. Unset runs the backend in
    /// disconnected mode (no camera, no device commands).
    pub printer_host: Option<String>,
    /// LAN access code printed on the device, used to authenticate the
    /// chamber camera stream.
    pub printer_access_code: String,
    /// TCP port of the chamber camera service. Defaults to `6000`.
    pub camera_port: u16,
    /// Pixel width advertised to stream viewers. Defaults to `1280`.
    pub camera_width: u16,
    /// Pixel height advertised to stream viewers. Defaults to `720`.
    pub camera_height: u16,
    /// Seconds of viewer silence before a connection is presumed dead.
    /// Defaults to `15`.
    pub heartbeat_timeout_secs: u64,
    /// Seconds between heartbeat sweeps. Defaults to `5`.
    pub heartbeat_sweep_secs: u64,
    /// Append-only message log file. Defaults to `printwatch.log`.
    pub log_file: PathBuf,
    /// Directory the single-page frontend is served from. Defaults to `wwwroot`.
    pub wwwroot: PathBuf,
    /// Directory downloaded project archives are served from.
    /// Defaults to `projectArchive`.
    pub project_archive: PathBuf,
    /// Newline-delimited telemetry recording to replay instead of talking to
    /// a real printer. Unset disables replay.
    pub replay_file: Option<PathBuf>,
    /// Milliseconds between replayed telemetry snapshots. Defaults to `1000`.
    pub replay_interval_ms: u64,
}

impl ServerConfig {
    /// Builds a configuration from environment variables.
    ///
    /// | Env Var | Default |
    /// |---|---|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `3000` |
    /// | `DATABASE_URL` | `sqlite:printwatch.db` |
    /// | `CORS_ORIGINS` | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS` | `30` |
    /// | `PRINTER_HOST` | unset |
    /// | `PRINTER_ACCESS_CODE` | empty |
    /// | `CAMERA_PORT` | `6000` |
    /// | `CAMERA_WIDTH` | `1280` |
    /// | `CAMERA_HEIGHT` | `720` |
    /// | `HEARTBEAT_TIMEOUT_SECS` | `15` |
    /// | `HEARTBEAT_SWEEP_SECS` | `5` |
    /// | `LOG_FILE` | `printwatch.log` |
    /// | `WWWROOT` | `wwwroot` |
    /// | `PROJECT_ARCHIVE` | `projectArchive` |
    /// | `REPLAY_FILE` | unset |
    /// | `REPLAY_INTERVAL_MS` | `1000` |
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .expect("PORT must be a valid u16"),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:printwatch.db".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .expect("REQUEST_TIMEOUT_SECS must be a valid u64"),
            printer_host: std::env::var("PRINTER_HOST")
                .ok()
                .filter(|s| !s.is_empty()),
            printer_access_code: std::env::var("PRINTER_ACCESS_CODE").unwrap_or_default(),
            camera_port: std::env::var("CAMERA_PORT")
                .unwrap_or_else(|_| "6000".into())
                .parse()
                .expect("CAMERA_PORT must be a valid u16"),
            camera_width: std::env::var("CAMERA_WIDTH")
                .unwrap_or_else(|_| "1280".into())
                .parse()
                .expect("CAMERA_WIDTH must be a valid u16"),
            camera_height: std::env::var("CAMERA_HEIGHT")
                .unwrap_or_else(|_| "720".into())
                .parse()
                .expect("CAMERA_HEIGHT must be a valid u16"),
            heartbeat_timeout_secs: std::env::var("HEARTBEAT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".into())
                .parse()
                .expect("HEARTBEAT_TIMEOUT_SECS must be a valid u64"),
            heartbeat_sweep_secs: std::env::var("HEARTBEAT_SWEEP_SECS")
                .unwrap_or_else(|_| "5".into())
                .parse()
                .expect("HEARTBEAT_SWEEP_SECS must be a valid u64"),
            log_file: std::env::var("LOG_FILE")
                .unwrap_or_else(|_| "printwatch.log".into())
                .into(),
            wwwroot: std::env::var("WWWROOT")
                .unwrap_or_else(|_| "wwwroot".into())
                .into(),
            project_archive: std::env::var("PROJECT_ARCHIVE")
                .unwrap_or_else(|_| "projectArchive".into())
                .into(),
            replay_file: std::env::var("REPLAY_FILE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            replay_interval_ms: std::env::var("REPLAY_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".into())
                .parse()
                .expect("REPLAY_INTERVAL_MS must be a valid u64"),
        }
    }

    /// Camera endpoint derived from the printer settings, or `None` when no
    /// printer host is configured.
    pub fn camera(&self) -> Option<CameraConfig> {
        let host = self.printer_host.clone()?;
        Some(CameraConfig {
            host,
            port: self.camera_port,
            access_code: self.printer_access_code.clone(),
        })
    }

    /// Replay settings, or `None` when no recording is configured.
    pub fn replay(&self) -> Option<ReplayConfig> {
        let path = self.replay_file.clone()?;
        Some(ReplayConfig {
            path,
            interval: Duration::from_millis(self.replay_interval_ms),
        })
    }

    /// How long a viewer may stay silent before its connection is dropped.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Interval between heartbeat sweeps.
    pub fn heartbeat_sweep(&self) -> Duration {
        Duration::from_secs(self.heartbeat_sweep_secs)
    }
}
