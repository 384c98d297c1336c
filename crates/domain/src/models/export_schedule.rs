//! Export schedule domain models.
//!
//! A schedule is a durable recurrence definition. It owns enough state to
//! compute its own next trigger time, so schedules survive restarts without
//! an external cron source.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use shared::validation::{
    validate_day_of_month, validate_day_of_week, validate_lookback_days, validate_time_of_day,
    validate_tz_offset_minutes, MAX_SCHEDULE_NAME_LENGTH,
};

use super::{EntityType, EventType, ExportFormat};

/// Recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl FromStr for ScheduleFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(ScheduleFrequency::Daily),
            "weekly" => Ok(ScheduleFrequency::Weekly),
            "monthly" => Ok(ScheduleFrequency::Monthly),
            _ => Err(format!("Unknown schedule frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for ScheduleFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleFrequency::Daily => write!(f, "daily"),
            ScheduleFrequency::Weekly => write!(f, "weekly"),
            ScheduleFrequency::Monthly => write!(f, "monthly"),
        }
    }
}

/// The fields that determine a schedule's trigger instants. Pure input to
/// the trigger computation; carries no mutable run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSpec {
    pub frequency: ScheduleFrequency,
    /// 0 = Sunday .. 6 = Saturday. Set iff frequency is weekly.
    pub day_of_week: Option<i16>,
    /// 1..=31, clamped to the last day of short months. Set iff monthly.
    pub day_of_month: Option<i16>,
    pub time_of_day: NaiveTime,
    /// The scope's fixed reference timezone as a UTC offset.
    pub tz_offset_minutes: i32,
}

/// Export schedule domain model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSchedule {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub frequency: ScheduleFrequency,
    pub day_of_week: Option<i16>,
    pub day_of_month: Option<i16>,
    pub time_of_day: NaiveTime,
    pub tz_offset_minutes: i32,
    pub format: ExportFormat,
    pub event_types: Vec<EventType>,
    pub entity_types: Vec<EntityType>,
    /// Each materialized job covers `[now - lookback_days, now]`.
    pub lookback_days: i32,
    pub notify_targets: Vec<String>,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExportSchedule {
    pub fn trigger_spec(&self) -> TriggerSpec {
        TriggerSpec {
            frequency: self.frequency,
            day_of_week: self.day_of_week,
            day_of_month: self.day_of_month,
            time_of_day: self.time_of_day,
            tz_offset_minutes: self.tz_offset_minutes,
        }
    }
}

/// Errors rejected at schedule creation or update, before anything persists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleValidationError {
    #[error("Schedule name must not be empty")]
    EmptyName,

    #[error("Schedule name must not exceed {MAX_SCHEDULE_NAME_LENGTH} characters")]
    NameTooLong,

    #[error("Weekly schedules require dayOfWeek")]
    MissingDayOfWeek,

    #[error("Monthly schedules require dayOfMonth")]
    MissingDayOfMonth,

    #[error("{0}")]
    InvalidField(String),
}

fn field_error(err: validator::ValidationError) -> ScheduleValidationError {
    let message = err
        .message
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.code.to_string());
    ScheduleValidationError::InvalidField(message)
}

/// Validated schedule parameters that have not been persisted yet. The id,
/// run state and timestamps are assigned when the schedule is instantiated.
#[derive(Debug, Clone)]
pub struct NewExportSchedule {
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub frequency: ScheduleFrequency,
    pub day_of_week: Option<i16>,
    pub day_of_month: Option<i16>,
    pub time_of_day: NaiveTime,
    pub tz_offset_minutes: i32,
    pub format: ExportFormat,
    pub event_types: Vec<EventType>,
    pub entity_types: Vec<EntityType>,
    pub lookback_days: i32,
    pub notify_targets: Vec<String>,
    pub is_active: bool,
}

impl NewExportSchedule {
    pub fn trigger_spec(&self) -> TriggerSpec {
        TriggerSpec {
            frequency: self.frequency,
            day_of_week: self.day_of_week,
            day_of_month: self.day_of_month,
            time_of_day: self.time_of_day,
            tz_offset_minutes: self.tz_offset_minutes,
        }
    }

    /// Instantiate the schedule record. `next_run_at` comes from the trigger
    /// computation for the creation instant.
    pub fn into_schedule(self, next_run_at: DateTime<Utc>, now: DateTime<Utc>) -> ExportSchedule {
        ExportSchedule {
            id: Uuid::new_v4(),
            organization_id: self.organization_id,
            name: self.name,
            description: self.description,
            frequency: self.frequency,
            day_of_week: self.day_of_week,
            day_of_month: self.day_of_month,
            time_of_day: self.time_of_day,
            tz_offset_minutes: self.tz_offset_minutes,
            format: self.format,
            event_types: self.event_types,
            entity_types: self.entity_types,
            lookback_days: self.lookback_days,
            notify_targets: self.notify_targets,
            is_active: self.is_active,
            last_run_at: None,
            next_run_at,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Checks the frequency/day consistency rules and drops day fields that do
/// not apply to the frequency.
fn validate_trigger_fields(
    frequency: ScheduleFrequency,
    day_of_week: Option<i16>,
    day_of_month: Option<i16>,
) -> Result<(Option<i16>, Option<i16>), ScheduleValidationError> {
    match frequency {
        ScheduleFrequency::Daily => Ok((None, None)),
        ScheduleFrequency::Weekly => {
            let day = day_of_week.ok_or(ScheduleValidationError::MissingDayOfWeek)?;
            validate_day_of_week(day).map_err(field_error)?;
            Ok((Some(day), None))
        }
        ScheduleFrequency::Monthly => {
            let day = day_of_month.ok_or(ScheduleValidationError::MissingDayOfMonth)?;
            validate_day_of_month(day).map_err(field_error)?;
            Ok((None, Some(day)))
        }
    }
}

fn validate_name(name: &str) -> Result<String, ScheduleValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ScheduleValidationError::EmptyName);
    }
    if trimmed.len() > MAX_SCHEDULE_NAME_LENGTH {
        return Err(ScheduleValidationError::NameTooLong);
    }
    Ok(trimmed.to_string())
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime, ScheduleValidationError> {
    let (hour, minute) = validate_time_of_day(value).map_err(field_error)?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| ScheduleValidationError::InvalidField("Invalid time of day".to_string()))
}

/// Request payload for creating a schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportScheduleInput {
    pub name: String,
    pub description: Option<String>,
    pub frequency: ScheduleFrequency,
    pub day_of_week: Option<i16>,
    pub day_of_month: Option<i16>,
    /// Wall-clock trigger time, "HH:MM".
    pub time_of_day: String,
    /// Defaults to the scope's configured reference timezone.
    pub tz_offset_minutes: Option<i32>,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub event_types: Vec<EventType>,
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
    pub lookback_days: i32,
    #[serde(default)]
    pub notify_targets: Vec<String>,
    pub is_active: Option<bool>,
}

impl CreateExportScheduleInput {
    /// Validate into schedule parameters. `default_tz_offset_minutes` is the
    /// scope's configured reference timezone, used when the payload does not
    /// carry one.
    pub fn validate(
        self,
        organization_id: Uuid,
        default_tz_offset_minutes: i32,
    ) -> Result<NewExportSchedule, ScheduleValidationError> {
        let name = validate_name(&self.name)?;
        let (day_of_week, day_of_month) =
            validate_trigger_fields(self.frequency, self.day_of_week, self.day_of_month)?;
        let time_of_day = parse_time_of_day(&self.time_of_day)?;

        let tz_offset_minutes = self.tz_offset_minutes.unwrap_or(default_tz_offset_minutes);
        validate_tz_offset_minutes(tz_offset_minutes).map_err(field_error)?;
        validate_lookback_days(self.lookback_days).map_err(field_error)?;

        Ok(NewExportSchedule {
            organization_id,
            name,
            description: self.description,
            frequency: self.frequency,
            day_of_week,
            day_of_month,
            time_of_day,
            tz_offset_minutes,
            format: self.format,
            event_types: self.event_types,
            entity_types: self.entity_types,
            lookback_days: self.lookback_days,
            notify_targets: self.notify_targets,
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

/// Request payload for updating a schedule. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExportScheduleInput {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub frequency: Option<ScheduleFrequency>,
    pub day_of_week: Option<i16>,
    pub day_of_month: Option<i16>,
    pub time_of_day: Option<String>,
    pub tz_offset_minutes: Option<i32>,
    pub format: Option<ExportFormat>,
    pub event_types: Option<Vec<EventType>>,
    pub entity_types: Option<Vec<EntityType>>,
    pub lookback_days: Option<i32>,
    pub notify_targets: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl UpdateExportScheduleInput {
    /// Whether any field affecting trigger instants is being changed.
    pub fn changes_trigger(&self) -> bool {
        self.frequency.is_some()
            || self.day_of_week.is_some()
            || self.day_of_month.is_some()
            || self.time_of_day.is_some()
            || self.tz_offset_minutes.is_some()
    }

    /// Apply the update to a schedule in place. The caller recomputes
    /// `next_run_at` and bumps `updated_at` afterwards.
    pub fn apply(self, schedule: &mut ExportSchedule) -> Result<(), ScheduleValidationError> {
        if let Some(name) = self.name {
            schedule.name = validate_name(&name)?;
        }
        if let Some(description) = self.description {
            schedule.description = description;
        }

        let frequency = self.frequency.unwrap_or(schedule.frequency);
        let day_of_week = self.day_of_week.or(schedule.day_of_week);
        let day_of_month = self.day_of_month.or(schedule.day_of_month);
        let (day_of_week, day_of_month) =
            validate_trigger_fields(frequency, day_of_week, day_of_month)?;
        schedule.frequency = frequency;
        schedule.day_of_week = day_of_week;
        schedule.day_of_month = day_of_month;

        if let Some(time_of_day) = self.time_of_day {
            schedule.time_of_day = parse_time_of_day(&time_of_day)?;
        }
        if let Some(offset) = self.tz_offset_minutes {
            validate_tz_offset_minutes(offset).map_err(field_error)?;
            schedule.tz_offset_minutes = offset;
        }
        if let Some(format) = self.format {
            schedule.format = format;
        }
        if let Some(event_types) = self.event_types {
            schedule.event_types = event_types;
        }
        if let Some(entity_types) = self.entity_types {
            schedule.entity_types = entity_types;
        }
        if let Some(lookback_days) = self.lookback_days {
            validate_lookback_days(lookback_days).map_err(field_error)?;
            schedule.lookback_days = lookback_days;
        }
        if let Some(notify_targets) = self.notify_targets {
            schedule.notify_targets = notify_targets;
        }
        if let Some(is_active) = self.is_active {
            schedule.is_active = is_active;
        }

        Ok(())
    }
}
