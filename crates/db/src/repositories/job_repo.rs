//! Repository for the `jobs` table.
//!
//! The lifecycle engine is the only writer; every write is an upsert keyed
//! by job id so replays after a restart converge on the same rows.

use uuid::Uuid;

use printwatch_core::{Job, JobState};

use crate::models::JobRow;
use crate::DbPool;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, start_time, stop_time, file_name, project_archive_path, \
    state, project, comment, recipient";

/// CRUD operations for job records.
pub struct JobRepo;

impl JobRepo {
    /// Insert or fully replace a job record.
    pub async fn upsert(pool: &DbPool, job: &Job) -> Result<(), sqlx::Error> {
        let row = JobRow::from_job(job);
        sqlx::query(
            "INSERT INTO jobs \
                 (id, start_time, stop_time, file_name, project_archive_path, \
                  state, project, comment, recipient) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(id) DO UPDATE SET \
                 start_time = excluded.start_time, \
                 stop_time = excluded.stop_time, \
                 file_name = excluded.file_name, \
                 project_archive_path = excluded.project_archive_path, \
                 state = excluded.state, \
                 project = excluded.project, \
                 comment = excluded.comment, \
                 recipient = excluded.recipient",
        )
        .bind(&row.id)
        .bind(row.start_time)
        .bind(row.stop_time)
        .bind(&row.file_name)
        .bind(&row.project_archive_path)
        .bind(&row.state)
        .bind(&row.project)
        .bind(&row.comment)
        .bind(&row.recipient)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Fetch a single job by id.
    pub async fn find(pool: &DbPool, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ?1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?;
        Ok(row.and_then(decode_row))
    }

    /// All jobs, newest first.
    pub async fn history(pool: &DbPool) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs ORDER BY start_time DESC");
        let rows = sqlx::query_as::<_, JobRow>(&query).fetch_all(pool).await?;
        Ok(rows.into_iter().filter_map(decode_row).collect())
    }

    /// The most recently started job that never reached a terminal state,
    /// if any. Used at startup to resume tracking a print that was running
    /// when the monitor last stopped.
    pub async fn last_pending(pool: &DbPool) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE state IN (?1, ?2) \
             ORDER BY start_time DESC \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobState::Started.as_str())
            .bind(JobState::Paused.as_str())
            .fetch_optional(pool)
            .await?;
        Ok(row.and_then(decode_row))
    }
}

/// Decode a row, logging and skipping anything unreadable.
fn decode_row(row: JobRow) -> Option<Job> {
    let id = row.id.clone();
    match row.into_job() {
        Some(job) => Some(job),
        None => {
            tracing::warn!(id = %id, "Skipping undecodable job row");
            None
        }
    }
}
