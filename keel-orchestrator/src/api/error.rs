//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::{
    log_service::LogError, pipeline_service::PipelineError, project_service::ProjectError,
};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    DatabaseError(sqlx::Error),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFound(id) => ApiError::NotFound(format!("Project {} not found", id)),
            ProjectError::ValidationError(msg) => ApiError::BadRequest(msg),
            ProjectError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotFound(id) => {
                ApiError::NotFound(format!("Pipeline {} not found", id))
            }
            PipelineError::ValidationError(msg) => ApiError::BadRequest(msg),
            PipelineError::SourceError(msg) => {
                ApiError::BadRequest(format!("Cannot resolve branch: {}", msg))
            }
            PipelineError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<LogError> for ApiError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::JobNotFound(id) => ApiError::NotFound(format!("Job {} not found", id)),
            LogError::DeploymentNotFound(id) => {
                ApiError::NotFound(format!("Deployment {} not found", id))
            }
            LogError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_service_errors_map_to_status_codes() {
        let cases = [
            (
                ApiError::from(ProjectError::NotFound(Uuid::nil())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(PipelineError::SourceError("no such branch".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(LogError::DeploymentNotFound(Uuid::nil())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::InternalError("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
