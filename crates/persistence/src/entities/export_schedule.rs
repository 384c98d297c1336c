//! Export schedule entity.

use chrono::{DateTime, NaiveTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for export schedules.
#[derive(Debug, Clone, FromRow)]
pub struct ExportScheduleEntity {
    /// Unique identifier.
    pub id: Uuid,

    /// Organization this schedule belongs to.
    pub organization_id: Uuid,

    /// Display name.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Recurrence frequency (daily, weekly or monthly).
    pub frequency: String,

    /// Trigger weekday, 0 = Sunday. Set only for weekly schedules.
    pub day_of_week: Option<i16>,

    /// Trigger day of month, 1..=31. Set only for monthly schedules.
    pub day_of_month: Option<i16>,

    /// Wall-clock trigger time in the schedule's reference timezone.
    pub time_of_day: NaiveTime,

    /// Reference timezone as a UTC offset in minutes.
    pub tz_offset_minutes: i32,

    /// Export format for materialized jobs.
    pub format: String,

    /// Event-type filter copied to every materialized job.
    pub event_types: Vec<String>,

    /// Entity-type filter copied to every materialized job.
    pub entity_types: Vec<String>,

    /// Date range of each materialized job: [now - lookback_days, now].
    pub lookback_days: i32,

    /// Notification targets for job outcomes.
    pub notify_targets: Vec<String>,

    /// Inactive schedules are never evaluated by the tick loop.
    pub is_active: bool,

    /// When the schedule last materialized a job.
    pub last_run_at: Option<DateTime<Utc>>,

    /// Next trigger instant.
    pub next_run_at: DateTime<Utc>,

    /// When the schedule was created.
    pub created_at: DateTime<Utc>,

    /// When the schedule was last modified.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_schedule_entity_creation() {
        let now = Utc::now();
        let entity = ExportScheduleEntity {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Weekly compliance export".to_string(),
            description: None,
            frequency: "weekly".to_string(),
            day_of_week: Some(1),
            day_of_month: None,
            time_of_day: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            tz_offset_minutes: 0,
            format: "csv".to_string(),
            event_types: vec![],
            entity_types: vec![],
            lookback_days: 7,
            notify_targets: vec!["compliance@example.com".to_string()],
            is_active: true,
            last_run_at: None,
            next_run_at: now,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(entity.frequency, "weekly");
        assert!(entity.is_active);
    }
}
