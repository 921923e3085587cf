//! The job lifecycle state machine.
//!
//! [`JobEngine`] is the sole writer of job records.  It watches the
//! telemetry for prints starting, pausing and ending, keeps a session
//! ledger with at most one non-terminal ("active") job, persists every
//! change through [`JobRepo`] and broadcasts a [`JobEvent`] after each
//! persisted change.
//!
//! The ledger lock is held across the persistence write so that ledger
//! order, store order and event order always agree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use printwatch_core::{FieldChange, GcodeState, Job, JobState, PrinterStatus, Project};
use printwatch_db::repositories::JobRepo;
use printwatch_db::DbPool;
use printwatch_printer::PrinterHandle;

use crate::events::JobEvent;

/// Buffered job events per subscriber.
const EVENT_CAPACITY: usize = 64;

/// Every job this engine created or adopted this session, plus which of
/// them (at most one) is still running.
#[derive(Debug, Default)]
struct Ledger {
    jobs: Vec<Job>,
    active: Option<Uuid>,
}

impl Ledger {
    fn job_mut(&mut self, id: Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }

    fn active_file(&self) -> Option<(Uuid, String)> {
        let id = self.active?;
        let job = self.jobs.iter().find(|job| job.id == id)?;
        Some((id, job.file_name.clone()))
    }
}

pub struct JobEngine {
    pool: DbPool,
    printer: PrinterHandle,
    events: broadcast::Sender<JobEvent>,
    ledger: RwLock<Ledger>,
    /// Set once the first report has been processed; the first report must
    /// run even though the differ reports no changes for it.
    seen_report: AtomicBool,
}

impl JobEngine {
    pub fn new(pool: DbPool, printer: PrinterHandle) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            pool,
            printer,
            events,
            ledger: RwLock::new(Ledger::default()),
            seen_report: AtomicBool::new(false),
        })
    }

    /// Subscribe to ledger changes from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Adopt the most recent non-terminal persisted job, if any.
    ///
    /// Called once at startup so that a monitor restart mid-print resumes
    /// tracking the same job instead of allocating a duplicate when the
    /// next report arrives.
    pub async fn resume_pending(&self) -> Result<Option<Job>, sqlx::Error> {
        let Some(job) = JobRepo::last_pending(&self.pool).await? else {
            return Ok(None);
        };
        tracing::info!(id = %job.id, file = %job.file_name, "Resuming unfinished job");

        let mut ledger = self.ledger.write().await;
        ledger.active = Some(job.id);
        ledger.jobs.push(job.clone());
        Ok(Some(job))
    }

    /// The most recently started job of this session, terminal or not.
    ///
    /// Viewers keep showing a finished job until the next print starts.
    pub async fn current_job(&self) -> Option<Job> {
        self.ledger.read().await.jobs.last().cloned()
    }

    /// Persisted jobs, newest first.
    pub async fn history(&self) -> Result<Vec<Job>, sqlx::Error> {
        JobRepo::history(&self.pool).await
    }

    // -----------------------------------------------------------------
    // Telemetry input
    // -----------------------------------------------------------------

    /// Process one telemetry tick together with its change records.
    pub async fn handle_report(&self, status: &PrinterStatus, changes: &[FieldChange]) {
        let first = !self.seen_report.swap(true, Ordering::Relaxed);
        // The differ emits nothing for the first snapshot; after that, a
        // tick without changes cannot move the state machine.
        if changes.is_empty() && !first {
            return;
        }

        match status.gcode_state() {
            state @ (GcodeState::Prepare | GcodeState::Running | GcodeState::Pause) => {
                self.track_active_print(status, state).await;
            }
            GcodeState::Finish => {
                let outcome = if status.print_error != 0 {
                    JobState::Failed
                } else {
                    JobState::Completed
                };
                self.finish_active(outcome, "print finished").await;
            }
            GcodeState::Failed => {
                self.finish_active(JobState::Failed, "device reported failure")
                    .await;
            }
            GcodeState::Idle => {
                self.finish_active(JobState::Failed, "device returned to idle mid-print")
                    .await;
            }
            GcodeState::Unknown => {
                tracing::debug!(
                    gcode_state = %status.gcode_state_raw,
                    "Ignoring report with unrecognized print state",
                );
            }
        }
    }

    /// A link drop mid-print fails the job: the print may well continue on
    /// the device, but this monitor can no longer vouch for its outcome.
    pub async fn handle_connection(&self, connected: bool) {
        if connected {
            return;
        }
        // Reprocess the first report after a reconnect even if nothing
        // changed while we were away.
        self.seen_report.store(false, Ordering::Relaxed);
        self.finish_active(JobState::Failed, "printer disconnected mid-print")
            .await;
    }

    /// Attach plate/material metadata once it arrives from the device side.
    ///
    /// A job's project is immutable after the first attach.
    pub async fn attach_project(&self, job_id: Uuid, project: Project) {
        let mut ledger = self.ledger.write().await;
        let Some(job) = ledger.job_mut(job_id) else {
            tracing::warn!(id = %job_id, "Project metadata arrived for an unknown job");
            return;
        };
        if job.project.is_some() {
            return;
        }
        job.project = Some(project);
        let job = job.clone();
        self.persist(&job).await;
        tracing::info!(id = %job.id, "Project metadata attached");
        self.emit(JobEvent::Updated { job });
    }

    // -----------------------------------------------------------------
    // Viewer edits
    // -----------------------------------------------------------------

    /// Replace a job's comment. `Ok(false)` means no such job.
    pub async fn save_comment(&self, id: Uuid, comment: &str) -> Result<bool, sqlx::Error> {
        self.edit(id, |job| job.comment = comment.to_string()).await
    }

    /// Replace a job's recipient. `Ok(false)` means no such job.
    pub async fn save_recipient(&self, id: Uuid, recipient: &str) -> Result<bool, sqlx::Error> {
        self.edit(id, |job| job.recipient = recipient.to_string())
            .await
    }

    /// Apply a field edit to a ledger job or, failing that, a stored one.
    /// Exactly one [`JobEvent::Edited`] is emitted per applied edit.
    async fn edit(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut Job),
    ) -> Result<bool, sqlx::Error> {
        let mut ledger = self.ledger.write().await;
        if let Some(job) = ledger.job_mut(id) {
            apply(job);
            let job = job.clone();
            JobRepo::upsert(&self.pool, &job).await?;
            self.emit(JobEvent::Edited { job });
            return Ok(true);
        }

        // Not part of this session; look in history.
        let Some(mut job) = JobRepo::find(&self.pool, id).await? else {
            return Ok(false);
        };
        apply(&mut job);
        JobRepo::upsert(&self.pool, &job).await?;
        self.emit(JobEvent::Edited { job });
        Ok(true)
    }

    // -----------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------

    async fn track_active_print(&self, status: &PrinterStatus, state: GcodeState) {
        if !status.has_print_file() {
            // An active state without a named file is either a report
            // arriving out of order or a firmware hiccup; keep whatever
            // job is tracked and wait for a terminal state.
            return;
        }
        let desired = if state == GcodeState::Pause {
            JobState::Paused
        } else {
            JobState::Started
        };
        let file_name = status.print_name().to_string();

        let mut ledger = self.ledger.write().await;
        match ledger.active_file() {
            Some((id, tracked)) if tracked == file_name => {
                let Some(job) = ledger.job_mut(id) else { return };
                if job.state == desired {
                    return;
                }
                job.state = desired;
                let job = job.clone();
                self.persist(&job).await;
                tracing::info!(id = %job.id, state = %job.state, "Job state changed");
                self.emit(JobEvent::Updated { job });
            }
            Some((id, _)) => {
                // A different print started while one was still tracked:
                // the old job ended without this monitor seeing it.
                let Some(stale) = ledger.job_mut(id).map(|job| {
                    job.state = JobState::Failed;
                    job.stop_time = Some(Utc::now());
                    job.clone()
                }) else {
                    return;
                };
                ledger.active = None;
                self.persist(&stale).await;
                tracing::warn!(
                    id = %stale.id,
                    file = %stale.file_name,
                    "New print superseded a job that never finished",
                );
                self.emit(JobEvent::Finished { job: stale });

                self.start_job(&mut ledger, status, desired, file_name).await;
            }
            None => {
                self.start_job(&mut ledger, status, desired, file_name).await;
            }
        }
    }

    async fn start_job(
        &self,
        ledger: &mut Ledger,
        status: &PrinterStatus,
        state: JobState,
        file_name: String,
    ) {
        let job = Job {
            id: Uuid::new_v4(),
            start_time: Utc::now(),
            stop_time: None,
            file_name,
            project_archive_path: status.gcode_file.clone(),
            state,
            project: None,
            comment: String::new(),
            recipient: String::new(),
        };
        ledger.active = Some(job.id);
        ledger.jobs.push(job.clone());

        self.persist(&job).await;
        tracing::info!(id = %job.id, file = %job.file_name, "Job started");

        // Plate/material metadata is fetched out of band and attached via
        // attach_project whenever it arrives.
        self.printer.load_project(job.clone());
        self.emit(JobEvent::Created { job });
    }

    async fn finish_active(&self, outcome: JobState, reason: &str) {
        let mut ledger = self.ledger.write().await;
        let Some(id) = ledger.active.take() else {
            return;
        };
        let Some(job) = ledger.job_mut(id).map(|job| {
            job.state = outcome;
            job.stop_time = Some(Utc::now());
            job.clone()
        }) else {
            return;
        };
        self.persist(&job).await;
        tracing::info!(id = %job.id, outcome = %job.state, reason, "Job finished");
        self.emit(JobEvent::Finished { job });
    }

    /// Store writes are logged-and-absorbed: losing a write must not stall
    /// job tracking.
    async fn persist(&self, job: &Job) {
        if let Err(error) = JobRepo::upsert(&self.pool, job).await {
            tracing::error!(id = %job.id, %error, "Failed to persist job");
        }
    }

    fn emit(&self, event: JobEvent) {
        let _ = self.events.send(event);
    }
}
