//! Append-only message log.
//!
//! Every line lands in one file and is simultaneously announced on a
//! broadcast channel so connected viewers see it live. `full_log` replays
//! the file for viewers that arrive later.

use std::io;
use std::path::PathBuf;

use chrono::Utc;
use printwatch_core::{FieldChange, Job};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex};

/// Buffered live-log lines per subscriber before the oldest are dropped.
const LINE_CAPACITY: usize = 256;

pub struct Logbook {
    path: PathBuf,
    file: Mutex<File>,
    lines: broadcast::Sender<String>,
}

impl Logbook {
    /// Opens (or creates) the log file for appending.
    pub async fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let (lines, _) = broadcast::channel(LINE_CAPACITY);
        Ok(Self {
            path,
            file: Mutex::new(file),
            lines,
        })
    }

    /// Live feed of appended lines.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.lines.subscribe()
    }

    /// Appends one timestamped line and announces it.
    pub async fn log(&self, message: &str) {
        let line = format!("{} {}", Utc::now().format("%Y-%m-%d %H:%M:%S"), message);
        {
            let mut file = self.file.lock().await;
            if let Err(error) = write_line(&mut file, &line).await {
                tracing::error!(%error, "Failed to append to the message log");
            }
        }
        let _ = self.lines.send(line);
    }

    /// Records one telemetry field change as `path: old -> new`.
    pub async fn log_change(&self, change: &FieldChange) {
        self.log(&change.to_string()).await;
    }

    /// Records the start of a tracked job.
    pub async fn log_job_started(&self, job: &Job) {
        self.log(&format!("Job \"{}\" started", job.file_name)).await;
    }

    /// Records a job reaching a terminal state.
    pub async fn log_job_finished(&self, job: &Job) {
        self.log(&format!("Job \"{}\" finished: {}", job.file_name, job.state))
            .await;
    }

    /// Reads back the whole log, oldest line first.
    ///
    /// Takes the file lock so a concurrent append cannot be half-visible.
    pub async fn full_log(&self) -> io::Result<Vec<String>> {
        let _guard = self.file.lock().await;
        let contents = tokio::fs::read_to_string(&self.path).await?;
        Ok(contents.lines().map(str::to_string).collect())
    }
}

async fn write_line(file: &mut File, line: &str) -> io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await
}
