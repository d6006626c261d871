//! Webhook API Handlers
//!
//! Push events from the git host start pipeline runs.

use axum::{Json, extract::State, http::StatusCode};
use keel_core::domain::pipeline::PipelineRecord;
use keel_core::dto::webhook::PushEvent;
use keel_core::sanitize::{is_branch_name, is_commit_hash};
use serde::Serialize;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::{pipeline_service, project_service};

/// What a push event led to
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushOutcome {
    Queued { pipeline: PipelineRecord },
    Ignored { reason: String },
}

/// POST /webhook/push
/// Start a pipeline for the pushed branch
///
/// Tag pushes and branch deletions are acknowledged without starting a run.
/// Unknown repositories are registered with default settings.
pub async fn push(
    State(state): State<AppState>,
    Json(event): Json<PushEvent>,
) -> ApiResult<(StatusCode, Json<PushOutcome>)> {
    let (branch, commit) = match push_target(&event) {
        Ok(target) => target,
        Err(reason) => {
            tracing::info!("Ignoring push to {}: {}", event.git_ref, reason);
            return Ok((StatusCode::ACCEPTED, Json(PushOutcome::Ignored { reason })));
        }
    };

    tracing::info!(
        "Push to {} on {} ({})",
        event.repository.clone_url,
        branch,
        commit
    );

    let project = project_service::find_or_create_for_repo(
        &state.pool,
        &event.repository.name,
        &event.repository.clone_url,
        &state.defaults,
    )
    .await?;

    let pipeline =
        pipeline_service::trigger(&state.pool, &state.runner, &project, branch, Some(commit))
            .await?;

    Ok((StatusCode::ACCEPTED, Json(PushOutcome::Queued { pipeline })))
}

/// Branch and commit to build, or why the event starts nothing
fn push_target(event: &PushEvent) -> Result<(&str, &str), String> {
    let Some(branch) = event.branch() else {
        return Err(format!("{} is not a branch", event.git_ref));
    };
    if event.is_deletion() {
        return Err(format!("branch {} was deleted", branch));
    }
    if !is_branch_name(branch) {
        return Err(format!("invalid branch name '{}'", branch));
    }
    let commit = event.after.trim();
    if commit.is_empty() {
        return Err("push event carries no commit".to_string());
    }
    if !is_commit_hash(commit) {
        return Err(format!("invalid commit '{}'", commit));
    }
    Ok((branch, commit))
}
