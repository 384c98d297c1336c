//! Export job entity.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for export jobs.
#[derive(Debug, Clone, FromRow)]
pub struct ExportJobEntity {
    /// Unique database identifier.
    pub id: Uuid,

    /// User-facing job identifier (export_<random>).
    pub job_id: String,

    /// Organization this export belongs to.
    pub organization_id: Uuid,

    /// Originating schedule, when the job was materialized from one.
    pub schedule_id: Option<Uuid>,

    /// Current job status.
    pub status: String,

    /// Export format (csv, json or table).
    pub format: String,

    /// Inclusive start of the exported date range.
    pub date_from: DateTime<Utc>,

    /// Inclusive end of the exported date range.
    pub date_to: DateTime<Utc>,

    /// Event-type filter; empty means no filter.
    pub event_types: Vec<String>,

    /// Entity-type filter; empty means no filter.
    pub entity_types: Vec<String>,

    /// Number of records in the export, populated on completion.
    pub total_records: Option<i64>,

    /// Artifact size in bytes, populated on completion.
    pub artifact_size_bytes: Option<i64>,

    /// Handle into the artifact store, present only when completed.
    pub artifact_handle: Option<String>,

    /// Error message if the job failed.
    pub error_message: Option<String>,

    /// When the job was created.
    pub created_at: DateTime<Utc>,

    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,

    /// When the artifact retention window ends.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_job_entity_creation() {
        let now = Utc::now();
        let entity = ExportJobEntity {
            id: Uuid::new_v4(),
            job_id: "export_abc123".to_string(),
            organization_id: Uuid::new_v4(),
            schedule_id: None,
            status: "pending".to_string(),
            format: "csv".to_string(),
            date_from: now - chrono::Duration::days(7),
            date_to: now,
            event_types: vec!["delete".to_string()],
            entity_types: vec![],
            total_records: None,
            artifact_size_bytes: None,
            artifact_handle: None,
            error_message: None,
            created_at: now,
            completed_at: None,
            expires_at: now + chrono::Duration::hours(72),
        };

        assert_eq!(entity.status, "pending");
        assert_eq!(entity.format, "csv");
    }
}
