//! The `jobs` table row and its mapping to [`Job`].
//!
//! Identifiers and states live as text in sqlite; the project document is
//! a JSON column. Decoding is tolerant: a row this build cannot interpret
//! (foreign state string, mangled project JSON) decodes to `None` rather
//! than failing the whole query — the repository logs and skips it.

use sqlx::FromRow;
use uuid::Uuid;

use printwatch_core::{Job, Timestamp};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: String,
    pub start_time: Timestamp,
    pub stop_time: Option<Timestamp>,
    pub file_name: String,
    pub project_archive_path: String,
    pub state: String,
    pub project: Option<String>,
    pub comment: String,
    pub recipient: String,
}

impl JobRow {
    /// Encode a job for writing.
    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            start_time: job.start_time,
            stop_time: job.stop_time,
            file_name: job.file_name.clone(),
            project_archive_path: job.project_archive_path.clone(),
            state: job.state.as_str().to_string(),
            project: job
                .project
                .as_ref()
                .and_then(|p| serde_json::to_string(p).ok()),
            comment: job.comment.clone(),
            recipient: job.recipient.clone(),
        }
    }

    /// Decode a row; `None` when the id, state or project column cannot be
    /// interpreted.
    pub fn into_job(self) -> Option<Job> {
        let id = Uuid::parse_str(&self.id).ok()?;
        let state = self.state.parse().ok()?;
        let project = match self.project {
            Some(json) => Some(serde_json::from_str(&json).ok()?),
            None => None,
        };

        Some(Job {
            id,
            start_time: self.start_time,
            stop_time: self.stop_time,
            file_name: self.file_name,
            project_archive_path: self.project_archive_path,
            state,
            project,
            comment: self.comment,
            recipient: self.recipient,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use printwatch_core::{Filament, JobState, Project};

    fn sample_job() -> Job {
        Job {
            id: Uuid::new_v4(),
            start_time: Utc::now(),
            stop_time: None,
            file_name: "benchy".into(),
            project_archive_path: "/data/Metadata/plate_1.gcode".into(),
            state: JobState::Started,
            project: Some(Project {
                settings_name: "0.20mm Standard".into(),
                plate_index: 1,
                plate_name: "benchy".into(),
                thumbnail_file: "Metadata/plate_1.png".into(),
                total_weight: 14.2,
                filaments: vec![Filament {
                    tray_id: 0,
                    material: "PLA".into(),
                    colour: "8E9089FF".into(),
                    used_length: 4720.0,
                    used_weight: 14.2,
                    brand_family: "PLA Basic".into(),
                    brand_family_id: "GFA00".into(),
                    brand_id: "A00-D0".into(),
                    is_bbl: true,
                    uuid: "D046EF8FB5204757B64FEA3C90357E2C".into(),
                }],
            }),
            comment: "first of three".into(),
            recipient: "lab".into(),
        }
    }

    #[test]
    fn job_round_trips_through_row() {
        let job = sample_job();
        let decoded = JobRow::from_job(&job).into_job().unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn bad_id_decodes_to_none() {
        let mut row = JobRow::from_job(&sample_job());
        row.id = "not-a-uuid".into();
        assert!(row.into_job().is_none());
    }

    #[test]
    fn bad_state_decodes_to_none() {
        let mut row = JobRow::from_job(&sample_job());
        row.state = "Printing".into();
        assert!(row.into_job().is_none());
    }

    #[test]
    fn bad_project_json_decodes_to_none() {
        let mut row = JobRow::from_job(&sample_job());
        row.project = Some("{not json".into());
        assert!(row.into_job().is_none());
    }

    #[test]
    fn missing_project_is_fine() {
        let mut job = sample_job();
        job.project = None;
        let decoded = JobRow::from_job(&job).into_job().unwrap();
        assert!(decoded.project.is_none());
    }
}
