//! Job API Handlers
//!
//! HTTP endpoints for job output.

use axum::{
    Json,
    extract::{Path, State},
};
use keel_core::domain::log::LogLine;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::log_service;

/// GET /job/{id}/logs
/// Get the log lines of a job in emission order
pub async fn get_job_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<LogLine>>> {
    tracing::debug!("Getting logs for job: {}", id);

    let logs = log_service::get_job_logs(&state.pool, id).await?;

    Ok(Json(logs))
}
