//! Persistence contract
//!
//! The engine records pipeline, job, log and deployment state through this
//! trait. Each record is written only by the task that owns it, so
//! implementations need no cross-writer coordination.
//!
//! Write failures never abort a run: call sites go through [`best_effort`],
//! which logs and discards the error.

use async_trait::async_trait;
use keel_core::domain::deployment::DeploymentStatus;
use keel_core::domain::job::JobStatus;
use keel_core::domain::pipeline::{JobSpec, PipelineRecord, PipelineStatus};
use keel_core::domain::project::Project;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;

#[async_trait]
pub trait Store: Send + Sync {
    async fn update_pipeline_status(&self, pipeline_id: Uuid, status: PipelineStatus)
    -> Result<()>;

    /// Registers a job of a pipeline in `Pending` state
    async fn create_job(&self, pipeline_id: Uuid, job: &JobSpec) -> Result<Uuid>;

    async fn update_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        exit_code: Option<i32>,
    ) -> Result<()>;

    /// Appends lines to a job's log, preserving their order
    async fn append_job_logs(&self, job_id: Uuid, lines: Vec<String>) -> Result<()>;

    /// Reserves a deployment record for a pipeline in `Pending` state
    async fn create_deployment(&self, pipeline_id: Uuid) -> Result<Uuid>;

    async fn update_deployment_status(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
    ) -> Result<()>;

    async fn append_deployment_log(&self, deployment_id: Uuid, content: &str) -> Result<()>;

    /// Most recent pipeline of the project whose status is `Success`
    async fn last_successful_pipeline(&self, project_id: Uuid) -> Result<Option<PipelineRecord>>;

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>>;
}

/// Logs a failed persistence call and carries on
pub(crate) fn best_effort<T>(result: Result<T>, action: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to {}: {}", action, e);
            None
        }
    }
}
