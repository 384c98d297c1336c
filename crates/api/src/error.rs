use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain::models::{ExportValidationError, ScheduleValidationError};
use domain::services::artifact_store::ArtifactError;
use domain::services::storage::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("Resource not found".into()),
            StoreError::Backend(msg) => ApiError::Internal(format!("Storage error: {}", msg)),
        }
    }
}

impl From<ArtifactError> for ApiError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::NotFound(_) => {
                ApiError::NotFound("Export artifact not available".into())
            }
            ArtifactError::Backend(msg) => {
                ApiError::Internal(format!("Artifact store error: {}", msg))
            }
        }
    }
}

impl From<ExportValidationError> for ApiError {
    fn from(err: ExportValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ScheduleValidationError> for ApiError {
    fn from(err: ScheduleValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_not_found() {
        let error = ApiError::NotFound("job not found".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_api_error_conflict() {
        let error = ApiError::Conflict("already processing".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_api_error_validation() {
        let error = ApiError::Validation("invalid input".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_api_error_internal() {
        let error = ApiError::Internal("database connection failed".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::NotFound("test".to_string())),
            "Not found: test"
        );
        assert_eq!(
            format!("{}", ApiError::Validation("test".to_string())),
            "Validation error: test"
        );
        assert_eq!(
            format!("{}", ApiError::ServiceUnavailable("test".to_string())),
            "Service unavailable: test"
        );
    }

    #[test]
    fn test_from_store_error() {
        let error: ApiError = StoreError::NotFound.into();
        assert!(matches!(error, ApiError::NotFound(_)));

        let error: ApiError = StoreError::Backend("connection reset".to_string()).into();
        assert!(matches!(error, ApiError::Internal(_)));
    }

    #[test]
    fn test_from_artifact_error() {
        let error: ApiError = ArtifactError::NotFound("h".to_string()).into();
        assert!(matches!(error, ApiError::NotFound(_)));
    }

    #[test]
    fn test_from_validation_errors() {
        let error: ApiError = ExportValidationError::EndBeforeStart.into();
        match error {
            ApiError::Validation(msg) => assert!(msg.contains("end date")),
            _ => panic!("Expected Validation error"),
        }

        let error: ApiError = ScheduleValidationError::MissingDayOfWeek.into();
        assert!(matches!(error, ApiError::Validation(_)));
    }
}
