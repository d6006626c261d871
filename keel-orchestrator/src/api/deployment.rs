//! Deployment API Handlers
//!
//! HTTP endpoints for deployment output.

use axum::{
    Json,
    extract::{Path, State},
};
use keel_core::domain::log::DeploymentLog;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::log_service;

/// GET /deployment/{id}/logs
/// Get deployment output, including rollback markers
pub async fn get_deployment_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<DeploymentLog>>> {
    tracing::debug!("Getting logs for deployment: {}", id);

    let logs = log_service::get_deployment_logs(&state.pool, id).await?;

    Ok(Json(logs))
}
