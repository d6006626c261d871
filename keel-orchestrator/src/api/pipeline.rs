//! Pipeline API Handlers
//!
//! HTTP endpoints for inspecting pipeline runs.

use axum::{
    Json,
    extract::{Path, State},
};
use keel_core::dto::pipeline::PipelineDetails;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::pipeline_service;

/// GET /pipeline/{id}
/// Get a pipeline run with its jobs and deployment
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineDetails>> {
    tracing::debug!("Getting pipeline: {}", id);

    let details = pipeline_service::get_details(&state.pool, id).await?;

    Ok(Json(details))
}
