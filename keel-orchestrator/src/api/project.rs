//! Project API Handlers
//!
//! HTTP endpoints for project registration and manual triggers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use keel_core::domain::pipeline::PipelineRecord;
use keel_core::domain::project::Project;
use keel_core::dto::pipeline::TriggerPipeline;
use keel_core::dto::project::CreateProject;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::{pipeline_service, project_service};

/// POST /project
/// Register a new project
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    tracing::info!("Creating project: {}", req.name);

    let project = project_service::create_project(&state.pool, req, &state.defaults).await?;

    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /project/{id}
/// Get project by ID
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    tracing::debug!("Getting project: {}", id);

    let project = project_service::get_project(&state.pool, id).await?;

    Ok(Json(project))
}

/// POST /project/{id}/trigger
/// Start a pipeline run for a branch (and optionally a specific commit)
pub async fn trigger_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TriggerPipeline>,
) -> ApiResult<(StatusCode, Json<PipelineRecord>)> {
    tracing::info!("Manual trigger for project {} on {}", id, req.branch);

    let project = project_service::get_project(&state.pool, id).await?;
    let pipeline = pipeline_service::trigger(
        &state.pool,
        &state.runner,
        &project,
        &req.branch,
        req.commit.as_deref(),
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(pipeline)))
}
