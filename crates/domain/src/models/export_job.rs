//! Export job domain models.
//!
//! An export job is a single bounded execution: query the event log for a
//! date range, format the result, persist one downloadable artifact. Jobs
//! move `pending -> processing -> {completed, failed}` and are never mutated
//! after reaching a terminal state.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use shared::validation::MAX_EXPORT_RANGE_DAYS;

use super::{EntityType, EventFilter, EventType};

/// How long a completed artifact stays downloadable.
pub const ARTIFACT_RETENTION_HOURS: i64 = 72;

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Table,
}

impl ExportFormat {
    /// MIME type of the produced artifact.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Table => "application/vnd.ms-excel",
        }
    }

    /// File extension for the artifact name.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Table => "xls",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "table" => Ok(ExportFormat::Table),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Table => write!(f, "table"),
        }
    }
}

/// Export job status. Transitions are one-directional:
/// `pending -> processing -> {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ExportJobStatus {
    /// Whether the job can never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportJobStatus::Completed | ExportJobStatus::Failed)
    }
}

impl FromStr for ExportJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ExportJobStatus::Pending),
            "processing" => Ok(ExportJobStatus::Processing),
            "completed" => Ok(ExportJobStatus::Completed),
            "failed" => Ok(ExportJobStatus::Failed),
            _ => Err(format!("Unknown export job status: {}", s)),
        }
    }
}

impl std::fmt::Display for ExportJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportJobStatus::Pending => write!(f, "pending"),
            ExportJobStatus::Processing => write!(f, "processing"),
            ExportJobStatus::Completed => write!(f, "completed"),
            ExportJobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Errors rejected at job construction, before any job record exists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportValidationError {
    #[error("Export end date must not be before the start date")]
    EndBeforeStart,

    #[error("Export range of {days} days exceeds the {MAX_EXPORT_RANGE_DAYS}-day limit")]
    RangeTooLarge { days: i64 },
}

/// Export job domain model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub id: Uuid,
    /// User-facing identifier (`export_<random>`).
    pub job_id: String,
    pub organization_id: Uuid,
    /// Present when this job was materialized from a recurring schedule.
    pub schedule_id: Option<Uuid>,
    pub format: ExportFormat,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    pub event_types: Vec<EventType>,
    pub entity_types: Vec<EntityType>,
    pub status: ExportJobStatus,
    pub total_records: Option<i64>,
    pub artifact_size_bytes: Option<i64>,
    pub artifact_handle: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl ExportJob {
    /// The event-log filter for this job's exact parameters.
    pub fn event_filter(&self) -> EventFilter {
        EventFilter {
            date_from: self.date_from,
            date_to: self.date_to,
            event_types: self.event_types.clone(),
            entity_types: self.entity_types.clone(),
        }
    }

    /// Whether the artifact is still downloadable at `now`.
    pub fn artifact_available(&self, now: DateTime<Utc>) -> bool {
        self.status == ExportJobStatus::Completed
            && self.artifact_handle.is_some()
            && self.expires_at > now
    }
}

/// Validated parameters for a job that has not been persisted yet.
///
/// Construction is the only validation gate: a `NewExportJob` that exists
/// always satisfies `date_to >= date_from` and the 365-day range limit.
#[derive(Debug, Clone)]
pub struct NewExportJob {
    organization_id: Uuid,
    schedule_id: Option<Uuid>,
    format: ExportFormat,
    date_from: DateTime<Utc>,
    date_to: DateTime<Utc>,
    event_types: Vec<EventType>,
    entity_types: Vec<EntityType>,
}

impl NewExportJob {
    /// Validate parameters for an on-demand export request.
    pub fn on_demand(
        organization_id: Uuid,
        format: ExportFormat,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        event_types: Vec<EventType>,
        entity_types: Vec<EntityType>,
    ) -> Result<Self, ExportValidationError> {
        if date_to < date_from {
            return Err(ExportValidationError::EndBeforeStart);
        }
        let days = (date_to - date_from).num_days();
        if days > MAX_EXPORT_RANGE_DAYS {
            return Err(ExportValidationError::RangeTooLarge { days });
        }

        Ok(Self {
            organization_id,
            schedule_id: None,
            format,
            date_from,
            date_to,
            event_types,
            entity_types,
        })
    }

    /// Parameters for a job materialized from a due schedule. The schedule's
    /// lookback window was validated at schedule creation, so the derived
    /// range `[now - lookback, now]` cannot violate the job invariants.
    pub fn from_schedule(schedule: &super::ExportSchedule, now: DateTime<Utc>) -> Self {
        Self {
            organization_id: schedule.organization_id,
            schedule_id: Some(schedule.id),
            format: schedule.format,
            date_from: now - Duration::days(i64::from(schedule.lookback_days)),
            date_to: now,
            event_types: schedule.event_types.clone(),
            entity_types: schedule.entity_types.clone(),
        }
    }

    /// Materialize the pending job record.
    pub fn build(self, now: DateTime<Utc>) -> ExportJob {
        ExportJob {
            id: Uuid::new_v4(),
            job_id: generate_job_id(),
            organization_id: self.organization_id,
            schedule_id: self.schedule_id,
            format: self.format,
            date_from: self.date_from,
            date_to: self.date_to,
            event_types: self.event_types,
            entity_types: self.entity_types,
            status: ExportJobStatus::Pending,
            total_records: None,
            artifact_size_bytes: None,
            artifact_handle: None,
            error_message: None,
            created_at: now,
            completed_at: None,
            expires_at: now + Duration::hours(ARTIFACT_RETENTION_HOURS),
        }
    }
}

/// Generate a unique user-facing job ID.
pub fn generate_job_id() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 12] = rng.gen();
    format!("export_{}", URL_SAFE_NO_PAD.encode(random_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_job_id() {
        let job_id = generate_job_id();
        assert!(job_id.starts_with("export_"));
        assert!(job_id.len() > 10);

        let job_id2 = generate_job_id();
        assert_ne!(job_id, job_id2);
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("table".parse::<ExportFormat>().unwrap(), ExportFormat::Table);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_format_content_type() {
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv");
        assert_eq!(ExportFormat::Json.content_type(), "application/json");
        assert_eq!(ExportFormat::Table.content_type(), "application/vnd.ms-excel");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!ExportJobStatus::Pending.is_terminal());
        assert!(!ExportJobStatus::Processing.is_terminal());
        assert!(ExportJobStatus::Completed.is_terminal());
        assert!(ExportJobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_on_demand_rejects_inverted_range() {
        let from = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let result = NewExportJob::on_demand(
            Uuid::new_v4(),
            ExportFormat::Csv,
            from,
            to,
            vec![],
            vec![],
        );
        assert_eq!(result.unwrap_err(), ExportValidationError::EndBeforeStart);
    }

    #[test]
    fn test_on_demand_range_boundary() {
        let org = Uuid::new_v4();
        let from = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();

        // 365 days is accepted
        let to = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(NewExportJob::on_demand(org, ExportFormat::Json, from, to, vec![], vec![]).is_ok());

        // 366 days is rejected
        let to = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(
            NewExportJob::on_demand(org, ExportFormat::Json, from, to, vec![], vec![]).unwrap_err(),
            ExportValidationError::RangeTooLarge { days: 366 }
        );
    }

    #[test]
    fn test_on_demand_accepts_zero_length_range() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert!(
            NewExportJob::on_demand(Uuid::new_v4(), ExportFormat::Csv, at, at, vec![], vec![])
                .is_ok()
        );
    }

    #[test]
    fn test_build_produces_pending_job() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let from = now - Duration::days(7);
        let job = NewExportJob::on_demand(
            Uuid::new_v4(),
            ExportFormat::Csv,
            from,
            now,
            vec![EventType::Delete],
            vec![],
        )
        .unwrap()
        .build(now);

        assert_eq!(job.status, ExportJobStatus::Pending);
        assert!(job.job_id.starts_with("export_"));
        assert!(job.schedule_id.is_none());
        assert!(job.artifact_handle.is_none());
        assert_eq!(job.expires_at, now + Duration::hours(ARTIFACT_RETENTION_HOURS));
        assert_eq!(job.event_filter().event_types, vec![EventType::Delete]);
    }

    #[test]
    fn test_artifact_available() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut job = NewExportJob::on_demand(
            Uuid::new_v4(),
            ExportFormat::Csv,
            now - Duration::days(1),
            now,
            vec![],
            vec![],
        )
        .unwrap()
        .build(now);

        // Pending job has nothing to download
        assert!(!job.artifact_available(now));

        job.status = ExportJobStatus::Completed;
        job.artifact_handle = Some("artifacts/test".to_string());
        assert!(job.artifact_available(now));

        // Past the retention window
        assert!(!job.artifact_available(job.expires_at + Duration::seconds(1)));
    }
}
