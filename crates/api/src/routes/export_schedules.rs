//! Export schedule routes.
//!
//! CRUD over recurring schedules. Every edit recomputes `next_run_at` from
//! the updated trigger fields, so a schedule is never stale relative to its
//! own definition.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::{CreateExportScheduleInput, ExportSchedule, UpdateExportScheduleInput};
use domain::services::trigger;

/// Create export schedules router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_schedule).get(list_schedules))
        .route(
            "/:schedule_id",
            get(get_schedule).patch(update_schedule).delete(delete_schedule),
        )
}

/// Response for schedule list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExportSchedulesResponse {
    pub data: Vec<ExportSchedule>,
}

/// Create a recurring export schedule. The first `next_run_at` is computed
/// from the creation instant.
pub async fn create_schedule(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(input): Json<CreateExportScheduleInput>,
) -> Result<impl IntoResponse, ApiError> {
    let new = input.validate(org_id, state.config.export.default_tz_offset_minutes)?;

    let now = Utc::now();
    let next_run_at = trigger::next_trigger(&new.trigger_spec(), now);
    let schedule = new.into_schedule(next_run_at, now);

    state.schedules.insert(&schedule).await?;

    tracing::info!(
        schedule_id = %schedule.id,
        organization_id = %org_id,
        next_run_at = %schedule.next_run_at,
        "Export schedule created"
    );

    Ok((StatusCode::CREATED, Json(schedule)))
}

/// List an organization's schedules.
pub async fn list_schedules(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let schedules = state.schedules.list(org_id).await?;
    Ok(Json(ListExportSchedulesResponse { data: schedules }))
}

/// Get a specific schedule.
pub async fn get_schedule(
    State(state): State<AppState>,
    Path((org_id, schedule_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let schedule = state.schedules.find(org_id, schedule_id).await?;

    match schedule {
        Some(schedule) => Ok(Json(schedule)),
        None => Err(ApiError::NotFound("Export schedule not found".to_string())),
    }
}

/// Update a schedule. Any edit, including an `isActive` toggle, recomputes
/// `next_run_at` from the current instant.
pub async fn update_schedule(
    State(state): State<AppState>,
    Path((org_id, schedule_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateExportScheduleInput>,
) -> Result<impl IntoResponse, ApiError> {
    let mut schedule = state
        .schedules
        .find(org_id, schedule_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Export schedule not found".to_string()))?;

    input.apply(&mut schedule)?;

    let now = Utc::now();
    schedule.next_run_at = trigger::next_trigger(&schedule.trigger_spec(), now);
    schedule.updated_at = now;

    let updated = state.schedules.update(&schedule).await?;
    if !updated {
        return Err(ApiError::NotFound("Export schedule not found".to_string()));
    }

    Ok(Json(schedule))
}

/// Delete a schedule. Jobs it already materialized are independent and
/// remain.
pub async fn delete_schedule(
    State(state): State<AppState>,
    Path((org_id, schedule_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.schedules.delete(org_id, schedule_id).await?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Export schedule not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::ScheduleFrequency;

    #[test]
    fn test_create_input_deserializes_camel_case() {
        let json = r#"{
            "name": "Weekly compliance export",
            "frequency": "weekly",
            "dayOfWeek": 1,
            "timeOfDay": "09:00",
            "lookbackDays": 7,
            "notifyTargets": ["compliance@example.com"]
        }"#;
        let input: CreateExportScheduleInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.frequency, ScheduleFrequency::Weekly);
        assert_eq!(input.day_of_week, Some(1));
        assert_eq!(input.time_of_day, "09:00");
        assert_eq!(input.lookback_days, 7);
    }

    #[test]
    fn test_update_input_partial() {
        let json = r#"{"isActive": false}"#;
        let input: UpdateExportScheduleInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.is_active, Some(false));
        assert!(input.name.is_none());
        assert!(!input.changes_trigger());
    }
}
