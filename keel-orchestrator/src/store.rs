//! Postgres-backed engine store
//!
//! Adapts the repositories to the runner's [`Store`] contract.

use async_trait::async_trait;
use keel_core::domain::deployment::DeploymentStatus;
use keel_core::domain::job::JobStatus;
use keel_core::domain::pipeline::{JobSpec, PipelineRecord, PipelineStatus};
use keel_core::domain::project::Project;
use keel_runner::{EngineError, Result, Store};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{
    deployment_repository, job_repository, log_repository, pipeline_repository,
    project_repository,
};

/// [`Store`] writing through the orchestrator's database pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn persistence(err: sqlx::Error) -> EngineError {
    EngineError::Persistence(err.to_string())
}

fn ensure_updated(updated: bool, what: &str, id: Uuid) -> Result<()> {
    if updated {
        Ok(())
    } else {
        Err(EngineError::Persistence(format!("{} {} not found", what, id)))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn update_pipeline_status(
        &self,
        pipeline_id: Uuid,
        status: PipelineStatus,
    ) -> Result<()> {
        let updated = pipeline_repository::update_status(&self.pool, pipeline_id, status)
            .await
            .map_err(persistence)?;
        ensure_updated(updated, "pipeline", pipeline_id)
    }

    async fn create_job(&self, pipeline_id: Uuid, job: &JobSpec) -> Result<Uuid> {
        job_repository::create(&self.pool, pipeline_id, job)
            .await
            .map_err(persistence)
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        exit_code: Option<i32>,
    ) -> Result<()> {
        let updated = job_repository::update_status(&self.pool, job_id, status, exit_code)
            .await
            .map_err(persistence)?;
        ensure_updated(updated, "job", job_id)
    }

    async fn append_job_logs(&self, job_id: Uuid, lines: Vec<String>) -> Result<()> {
        log_repository::append_job_lines(&self.pool, job_id, lines)
            .await
            .map_err(persistence)
    }

    async fn create_deployment(&self, pipeline_id: Uuid) -> Result<Uuid> {
        deployment_repository::create(&self.pool, pipeline_id)
            .await
            .map_err(persistence)
    }

    async fn update_deployment_status(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
    ) -> Result<()> {
        let updated = deployment_repository::update_status(&self.pool, deployment_id, status)
            .await
            .map_err(persistence)?;
        ensure_updated(updated, "deployment", deployment_id)
    }

    async fn append_deployment_log(&self, deployment_id: Uuid, content: &str) -> Result<()> {
        log_repository::append_deployment_entry(&self.pool, deployment_id, content)
            .await
            .map_err(persistence)
    }

    async fn last_successful_pipeline(&self, project_id: Uuid) -> Result<Option<PipelineRecord>> {
        pipeline_repository::find_last_successful(&self.pool, project_id)
            .await
            .map_err(persistence)
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>> {
        project_repository::find_by_id(&self.pool, project_id)
            .await
            .map_err(persistence)
    }
}
