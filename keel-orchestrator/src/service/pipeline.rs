//! Pipeline Service
//!
//! Creates pipeline runs and hands them to the runner.

use keel_core::domain::pipeline::PipelineRecord;
use keel_core::domain::project::Project;
use keel_core::domain::run::RunParams;
use keel_core::dto::pipeline::PipelineDetails;
use keel_core::sanitize::{is_branch_name, is_commit_hash};
use keel_runner::PipelineRunner;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::{deployment_repository, job_repository, pipeline_repository};

/// Service error type
#[derive(Debug)]
pub enum PipelineError {
    NotFound(Uuid),
    ValidationError(String),
    /// The branch could not be resolved to a commit
    SourceError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Create a pending run of `project` and start it in the background
///
/// Without a commit the current tip of `branch` is used.
pub async fn trigger(
    pool: &PgPool,
    runner: &Arc<PipelineRunner>,
    project: &Project,
    branch: &str,
    commit: Option<&str>,
) -> Result<PipelineRecord> {
    let (branch, commit) = validate_target(branch, commit)?;

    let commit = match commit {
        Some(commit) => commit.to_string(),
        None => runner
            .fetcher()
            .resolve_head(&project.repo_url, branch, project.access_token.as_deref())
            .await
            .map_err(|e| PipelineError::SourceError(e.to_string()))?,
    };

    let pipeline = pipeline_repository::create(pool, project.id, branch, &commit).await?;

    tracing::info!(
        "Pipeline {} queued for {}@{} ({})",
        pipeline.id,
        project.name,
        branch,
        commit
    );

    // Detached: progress is observable through the pipeline record
    runner.spawn(RunParams::from_project(project, &pipeline));

    Ok(pipeline)
}

/// Checks the branch and optional commit before they reach git
fn validate_target<'a>(
    branch: &'a str,
    commit: Option<&'a str>,
) -> Result<(&'a str, Option<&'a str>)> {
    let branch = branch.trim();
    if branch.is_empty() {
        return Err(PipelineError::ValidationError(
            "Branch cannot be empty".to_string(),
        ));
    }
    if !is_branch_name(branch) {
        return Err(PipelineError::ValidationError(format!(
            "Invalid branch name '{}'",
            branch
        )));
    }

    let commit = commit.map(str::trim).filter(|c| !c.is_empty());
    if let Some(commit) = commit {
        if !is_commit_hash(commit) {
            return Err(PipelineError::ValidationError(format!(
                "Commit must be a 7-40 character hex hash, got '{}'",
                commit
            )));
        }
    }

    Ok((branch, commit))
}

/// Get a pipeline run with its jobs and deployment
pub async fn get_details(pool: &PgPool, id: Uuid) -> Result<PipelineDetails> {
    let pipeline = pipeline_repository::find_by_id(pool, id)
        .await?
        .ok_or(PipelineError::NotFound(id))?;
    let jobs = job_repository::find_by_pipeline(pool, id).await?;
    let deployment = deployment_repository::find_by_pipeline(pool, id).await?;

    Ok(PipelineDetails {
        pipeline,
        jobs,
        deployment,
    })
}
