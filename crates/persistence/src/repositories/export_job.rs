//! Export job repository for database operations.
//!
//! State transitions are conditional updates: the WHERE clause carries the
//! allowed source states, so a job can never be executed twice or mutated
//! after reaching a terminal state, even with concurrent callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{EntityType, EventType, ExportFormat, ExportJob, ExportJobStatus};
use domain::services::storage::{ExportJobStore, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ExportJobEntity;

const JOB_COLUMNS: &str = "id, job_id, organization_id, schedule_id, status, format, \
                           date_from, date_to, event_types, entity_types, total_records, \
                           artifact_size_bytes, artifact_handle, error_message, \
                           created_at, completed_at, expires_at";

/// Repository for export job database operations.
#[derive(Clone)]
pub struct ExportJobRepository {
    pool: PgPool,
}

impl ExportJobRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn type_strings<T: ToString>(items: &[T]) -> Vec<String> {
    items.iter().map(|t| t.to_string()).collect()
}

#[async_trait]
impl ExportJobStore for ExportJobRepository {
    async fn insert(&self, job: &ExportJob) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO export_jobs (
                id, job_id, organization_id, schedule_id, status, format,
                date_from, date_to, event_types, entity_types, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(job.id)
        .bind(&job.job_id)
        .bind(job.organization_id)
        .bind(job.schedule_id)
        .bind(job.status.to_string())
        .bind(job.format.to_string())
        .bind(job.date_from)
        .bind(job.date_to)
        .bind(type_strings(&job.event_types))
        .bind(type_strings(&job.entity_types))
        .bind(job.created_at)
        .bind(job.expires_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn find(
        &self,
        organization_id: Uuid,
        job_id: &str,
    ) -> Result<Option<ExportJob>, StoreError> {
        let entity = sqlx::query_as::<_, ExportJobEntity>(&format!(
            "SELECT {} FROM export_jobs WHERE job_id = $1 AND organization_id = $2",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(entity.map(entity_to_domain))
    }

    async fn list(
        &self,
        organization_id: Uuid,
        status: Option<ExportJobStatus>,
        limit: i64,
    ) -> Result<Vec<ExportJob>, StoreError> {
        let entities = match status {
            Some(status) => {
                sqlx::query_as::<_, ExportJobEntity>(&format!(
                    "SELECT {} FROM export_jobs \
                     WHERE organization_id = $1 AND status = $2 \
                     ORDER BY created_at DESC LIMIT $3",
                    JOB_COLUMNS
                ))
                .bind(organization_id)
                .bind(status.to_string())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, ExportJobEntity>(&format!(
                    "SELECT {} FROM export_jobs \
                     WHERE organization_id = $1 \
                     ORDER BY created_at DESC LIMIT $2",
                    JOB_COLUMNS
                ))
                .bind(organization_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(backend)?;

        Ok(entities.into_iter().map(entity_to_domain).collect())
    }

    async fn mark_processing(&self, job_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE export_jobs
            SET status = 'processing'
            WHERE job_id = $1 AND status = 'pending'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_completed(
        &self,
        job_id: &str,
        total_records: i64,
        artifact_size_bytes: i64,
        artifact_handle: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE export_jobs
            SET status = 'completed', total_records = $2, artifact_size_bytes = $3,
                artifact_handle = $4, completed_at = $5
            WHERE job_id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(job_id)
        .bind(total_records)
        .bind(artifact_size_bytes)
        .bind(artifact_handle)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(
        &self,
        job_id: &str,
        error_message: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE export_jobs
            SET status = 'failed', error_message = $2, completed_at = $3
            WHERE job_id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(job_id)
        .bind(error_message)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(
        &self,
        organization_id: Uuid,
        job_id: &str,
    ) -> Result<Option<ExportJob>, StoreError> {
        let entity = sqlx::query_as::<_, ExportJobEntity>(&format!(
            "DELETE FROM export_jobs WHERE job_id = $1 AND organization_id = $2 RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(entity.map(entity_to_domain))
    }

    async fn find_expired(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ExportJob>, StoreError> {
        let entities = sqlx::query_as::<_, ExportJobEntity>(&format!(
            "SELECT {} FROM export_jobs \
             WHERE status IN ('completed', 'failed') AND expires_at <= $1 \
             ORDER BY expires_at LIMIT $2",
            JOB_COLUMNS
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(entities.into_iter().map(entity_to_domain).collect())
    }
}

fn entity_to_domain(entity: ExportJobEntity) -> ExportJob {
    let status = entity
        .status
        .parse::<ExportJobStatus>()
        .unwrap_or(ExportJobStatus::Pending);
    let format = entity
        .format
        .parse::<ExportFormat>()
        .unwrap_or(ExportFormat::Json);

    ExportJob {
        id: entity.id,
        job_id: entity.job_id,
        organization_id: entity.organization_id,
        schedule_id: entity.schedule_id,
        format,
        date_from: entity.date_from,
        date_to: entity.date_to,
        event_types: entity.event_types.into_iter().map(EventType::from).collect(),
        entity_types: entity
            .entity_types
            .into_iter()
            .map(EntityType::from)
            .collect(),
        status,
        total_records: entity.total_records,
        artifact_size_bytes: entity.artifact_size_bytes,
        artifact_handle: entity.artifact_handle,
        error_message: entity.error_message,
        created_at: entity.created_at,
        completed_at: entity.completed_at,
        expires_at: entity.expires_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_to_domain_parses_enums() {
        let now = Utc::now();
        let entity = ExportJobEntity {
            id: Uuid::new_v4(),
            job_id: "export_x".to_string(),
            organization_id: Uuid::new_v4(),
            schedule_id: Some(Uuid::new_v4()),
            status: "processing".to_string(),
            format: "table".to_string(),
            date_from: now - chrono::Duration::days(1),
            date_to: now,
            event_types: vec!["delete".to_string(), "grade_override".to_string()],
            entity_types: vec!["course".to_string()],
            total_records: None,
            artifact_size_bytes: None,
            artifact_handle: None,
            error_message: None,
            created_at: now,
            completed_at: None,
            expires_at: now,
        };

        let job = entity_to_domain(entity);
        assert_eq!(job.status, ExportJobStatus::Processing);
        assert_eq!(job.format, ExportFormat::Table);
        assert_eq!(
            job.event_types,
            vec![
                EventType::Delete,
                EventType::Other("grade_override".to_string())
            ]
        );
        assert_eq!(job.entity_types, vec![EntityType::Course]);
    }

    #[test]
    fn test_entity_to_domain_unknown_status_falls_back() {
        let now = Utc::now();
        let entity = ExportJobEntity {
            id: Uuid::new_v4(),
            job_id: "export_y".to_string(),
            organization_id: Uuid::new_v4(),
            schedule_id: None,
            status: "archived".to_string(),
            format: "yaml".to_string(),
            date_from: now,
            date_to: now,
            event_types: vec![],
            entity_types: vec![],
            total_records: None,
            artifact_size_bytes: None,
            artifact_handle: None,
            error_message: None,
            created_at: now,
            completed_at: None,
            expires_at: now,
        };

        let job = entity_to_domain(entity);
        assert_eq!(job.status, ExportJobStatus::Pending);
        assert_eq!(job.format, ExportFormat::Json);
    }
}
