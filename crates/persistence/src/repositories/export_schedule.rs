//! Export schedule repository for database operations.
//!
//! The claim is a single conditional UPDATE: it advances the run state only
//! when the schedule is still active and `next_run_at` still equals the
//! value the engine read. Rows-affected tells the caller whether it won the
//! occurrence, which keeps concurrent engine instances from materializing
//! duplicate jobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{
    EntityType, EventType, ExportFormat, ExportSchedule, ScheduleFrequency,
};
use domain::services::storage::{ExportScheduleStore, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ExportScheduleEntity;

const SCHEDULE_COLUMNS: &str = "id, organization_id, name, description, frequency, day_of_week, \
                                day_of_month, time_of_day, tz_offset_minutes, format, \
                                event_types, entity_types, lookback_days, notify_targets, \
                                is_active, last_run_at, next_run_at, created_at, updated_at";

/// Repository for export schedule database operations.
#[derive(Clone)]
pub struct ExportScheduleRepository {
    pool: PgPool,
}

impl ExportScheduleRepository {
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
impl ExportScheduleStore for ExportScheduleRepository {
    async fn insert(&self, schedule: &ExportSchedule) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO export_schedules (
                id, organization_id, name, description, frequency, day_of_week,
                day_of_month, time_of_day, tz_offset_minutes, format, event_types,
                entity_types, lookback_days, notify_targets, is_active, last_run_at,
                next_run_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19)
            "#,
        )
        .bind(schedule.id)
        .bind(schedule.organization_id)
        .bind(&schedule.name)
        .bind(&schedule.description)
        .bind(schedule.frequency.to_string())
        .bind(schedule.day_of_week)
        .bind(schedule.day_of_month)
        .bind(schedule.time_of_day)
        .bind(schedule.tz_offset_minutes)
        .bind(schedule.format.to_string())
        .bind(type_strings(&schedule.event_types))
        .bind(type_strings(&schedule.entity_types))
        .bind(schedule.lookback_days)
        .bind(&schedule.notify_targets)
        .bind(schedule.is_active)
        .bind(schedule.last_run_at)
        .bind(schedule.next_run_at)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn find(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ExportSchedule>, StoreError> {
        let entity = sqlx::query_as::<_, ExportScheduleEntity>(&format!(
            "SELECT {} FROM export_schedules WHERE id = $1 AND organization_id = $2",
            SCHEDULE_COLUMNS
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(entity.map(entity_to_domain))
    }

    async fn list(&self, organization_id: Uuid) -> Result<Vec<ExportSchedule>, StoreError> {
        let entities = sqlx::query_as::<_, ExportScheduleEntity>(&format!(
            "SELECT {} FROM export_schedules WHERE organization_id = $1 ORDER BY created_at",
            SCHEDULE_COLUMNS
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(entities.into_iter().map(entity_to_domain).collect())
    }

    async fn update(&self, schedule: &ExportSchedule) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE export_schedules
            SET name = $3, description = $4, frequency = $5, day_of_week = $6,
                day_of_month = $7, time_of_day = $8, tz_offset_minutes = $9,
                format = $10, event_types = $11, entity_types = $12,
                lookback_days = $13, notify_targets = $14, is_active = $15,
                last_run_at = $16, next_run_at = $17, updated_at = $18
            WHERE id = $1 AND organization_id = $2
            "#,
        )
        .bind(schedule.id)
        .bind(schedule.organization_id)
        .bind(&schedule.name)
        .bind(&schedule.description)
        .bind(schedule.frequency.to_string())
        .bind(schedule.day_of_week)
        .bind(schedule.day_of_month)
        .bind(schedule.time_of_day)
        .bind(schedule.tz_offset_minutes)
        .bind(schedule.format.to_string())
        .bind(type_strings(&schedule.event_types))
        .bind(type_strings(&schedule.entity_types))
        .bind(schedule.lookback_days)
        .bind(&schedule.notify_targets)
        .bind(schedule.is_active)
        .bind(schedule.last_run_at)
        .bind(schedule.next_run_at)
        .bind(schedule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, organization_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM export_schedules WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ExportSchedule>, StoreError> {
        let entities = sqlx::query_as::<_, ExportScheduleEntity>(&format!(
            "SELECT {} FROM export_schedules \
             WHERE is_active = TRUE AND next_run_at <= $1 \
             ORDER BY next_run_at",
            SCHEDULE_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(entities.into_iter().map(entity_to_domain).collect())
    }

    async fn claim_due(
        &self,
        id: Uuid,
        expected_next_run_at: DateTime<Utc>,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE export_schedules
            SET last_run_at = $3, next_run_at = $4, updated_at = $3
            WHERE id = $1 AND is_active = TRUE AND next_run_at = $2
            "#,
        )
        .bind(id)
        .bind(expected_next_run_at)
        .bind(last_run_at)
        .bind(next_run_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }
}

fn entity_to_domain(entity: ExportScheduleEntity) -> ExportSchedule {
    let frequency = entity
        .frequency
        .parse::<ScheduleFrequency>()
        .unwrap_or(ScheduleFrequency::Daily);
    let format = entity
        .format
        .parse::<ExportFormat>()
        .unwrap_or(ExportFormat::Json);

    ExportSchedule {
        id: entity.id,
        organization_id: entity.organization_id,
        name: entity.name,
        description: entity.description,
        frequency,
        day_of_week: entity.day_of_week,
        day_of_month: entity.day_of_month,
        time_of_day: entity.time_of_day,
        tz_offset_minutes: entity.tz_offset_minutes,
        format,
        event_types: entity.event_types.into_iter().map(EventType::from).collect(),
        entity_types: entity
            .entity_types
            .into_iter()
            .map(EntityType::from)
            .collect(),
        lookback_days: entity.lookback_days,
        notify_targets: entity.notify_targets,
        is_active: entity.is_active,
        last_run_at: entity.last_run_at,
        next_run_at: entity.next_run_at,
        created_at: entity.created_at,
        updated_at: entity.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn test_entity_to_domain_parses_enums() {
        let now = Utc::now();
        let entity = ExportScheduleEntity {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Monthly archive".to_string(),
            description: Some("Full month of activity".to_string()),
            frequency: "monthly".to_string(),
            day_of_week: None,
            day_of_month: Some(31),
            time_of_day: NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
            tz_offset_minutes: -300,
            format: "table".to_string(),
            event_types: vec!["enroll".to_string()],
            entity_types: vec!["badge".to_string()],
            lookback_days: 31,
            notify_targets: vec!["ops@example.com".to_string()],
            is_active: true,
            last_run_at: None,
            next_run_at: now,
            created_at: now,
            updated_at: now,
        };

        let schedule = entity_to_domain(entity);
        assert_eq!(schedule.frequency, ScheduleFrequency::Monthly);
        assert_eq!(schedule.format, ExportFormat::Table);
        assert_eq!(schedule.event_types, vec![EventType::Enroll]);
        assert_eq!(
            schedule.entity_types,
            vec![EntityType::Other("badge".to_string())]
        );
        assert_eq!(schedule.tz_offset_minutes, -300);
    }
}
