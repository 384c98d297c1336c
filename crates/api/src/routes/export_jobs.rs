//! Export job routes.
//!
//! On-demand job creation, listing, artifact download and deletion. All
//! routes are scoped to the owning organization; the identity layer in
//! front of this service resolves whether the caller may act for it.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::{
    EntityType, EventType, ExportFormat, ExportJob, ExportJobStatus, NewExportJob,
};

/// Default and maximum page sizes for job listings.
const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// Create export jobs router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_export_job).get(list_export_jobs))
        .route("/:job_id", get(get_export_job).delete(delete_export_job))
        .route("/:job_id/download", get(download_export_artifact))
        .route("/:job_id/fail", post(fail_export_job))
}

/// Request payload for an on-demand export.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportJobRequest {
    #[serde(default)]
    pub format: ExportFormat,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    #[serde(default)]
    pub event_types: Vec<EventType>,
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
}

/// Query parameters for listing export jobs.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExportJobsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// Response for export job list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExportJobsResponse {
    pub data: Vec<ExportJob>,
}

/// Create an on-demand export job. Validation happens before the job record
/// exists; accepted jobs start `pending` and are dispatched to the worker
/// pool immediately.
pub async fn create_export_job(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(request): Json<CreateExportJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_job = NewExportJob::on_demand(
        org_id,
        request.format,
        request.date_from,
        request.date_to,
        request.event_types,
        request.entity_types,
    )?;

    let job = new_job.build(Utc::now());
    state.jobs.insert(&job).await?;
    state.runner.submit(job.clone());

    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// List export jobs, optionally filtered by status.
pub async fn list_export_jobs(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(query): Query<ListExportJobsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<ExportJobStatus>()
                .map_err(ApiError::Validation)
        })
        .transpose()?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let jobs = state.jobs.list(org_id, status, limit).await?;
    Ok(Json(ListExportJobsResponse { data: jobs }))
}

/// Get a specific export job.
pub async fn get_export_job(
    State(state): State<AppState>,
    Path((org_id, job_id)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.jobs.find(org_id, &job_id).await?;

    match job {
        Some(job) => Ok(Json(job)),
        None => Err(ApiError::NotFound("Export job not found".to_string())),
    }
}

/// Download a completed export's artifact. Only completed jobs whose
/// retention window has not passed have a downloadable artifact; everything
/// else is an explicit "not available", never a partial file.
pub async fn download_export_artifact(
    State(state): State<AppState>,
    Path((org_id, job_id)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .jobs
        .find(org_id, &job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Export job not found".to_string()))?;

    if !job.artifact_available(Utc::now()) {
        return Err(ApiError::NotFound(
            "Export artifact not available".to_string(),
        ));
    }

    let handle = job
        .artifact_handle
        .as_deref()
        .ok_or_else(|| ApiError::NotFound("Export artifact not available".to_string()))?;
    let content = state.artifacts.retrieve(handle).await?;

    let filename = format!("{}.{}", job.job_id, job.format.extension());
    Ok((
        [
            (header::CONTENT_TYPE, content.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        content.bytes,
    ))
}

/// Delete a job and its artifact, if any.
pub async fn delete_export_job(
    State(state): State<AppState>,
    Path((org_id, job_id)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.jobs.delete(org_id, &job_id).await?;

    match deleted {
        Some(job) => {
            if let Some(handle) = &job.artifact_handle {
                if let Err(e) = state.artifacts.delete(handle).await {
                    tracing::warn!(job_id = %job.job_id, error = %e, "Failed to delete artifact");
                }
            }
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::NotFound("Export job not found".to_string())),
    }
}

/// Administratively fail a stuck job. Only `processing` jobs qualify: a
/// pending job will still run, and terminal jobs never change again.
pub async fn fail_export_job(
    State(state): State<AppState>,
    Path((org_id, job_id)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .jobs
        .find(org_id, &job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Export job not found".to_string()))?;

    if job.status != ExportJobStatus::Processing {
        return Err(ApiError::Conflict(format!(
            "Only processing jobs can be marked failed (status is {})",
            job.status
        )));
    }

    state
        .jobs
        .mark_failed(&job_id, "Marked failed by operator", Utc::now())
        .await?;

    let updated = state
        .jobs
        .find(org_id, &job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Export job not found".to_string()))?;
    Ok(Json(updated))
}
