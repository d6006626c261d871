//! Pipeline orchestration
//!
//! [`PipelineRunner`] drives one run from checkout to final status:
//!
//! 1. Mark the pipeline running and fetch the source into a fresh workspace
//! 2. Parse the pipeline configuration found in the checkout
//! 3. Reserve job and deployment records, then run the stages
//! 4. Deploy, rolling back to the last successful commit if that fails
//! 5. Release the workspace and record the final pipeline status
//!
//! Fetch and configuration errors end the run before any job starts.
//! Persistence errors are logged and the run carries on.

use keel_core::domain::deployment::DeploymentStatus;
use keel_core::domain::pipeline::{PipelineConfig, PipelineStatus};
use keel_core::domain::run::RunParams;
use keel_core::parser::parse_file;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::git::SourceFetcher;
use crate::podman::ContainerRuntime;
use crate::scheduler::StageScheduler;
use crate::service::{Deployer, DeploymentController};
use crate::store::{Store, best_effort};
use crate::workspace::Workspace;

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub pipeline: PipelineStatus,
    /// `None` when the run ended before a deployment was reserved
    pub deployment: Option<DeploymentStatus>,
}

impl RunOutcome {
    fn aborted() -> Self {
        Self {
            pipeline: PipelineStatus::Failed,
            deployment: None,
        }
    }
}

/// Top-level driver of pipeline runs
pub struct PipelineRunner {
    config: EngineConfig,
    store: Arc<dyn Store>,
    fetcher: Arc<dyn SourceFetcher>,
    scheduler: StageScheduler,
    deployments: DeploymentController,
}

impl PipelineRunner {
    pub fn new(
        config: EngineConfig,
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn Store>,
        fetcher: Arc<dyn SourceFetcher>,
        deployer: Arc<dyn Deployer>,
    ) -> Self {
        let scheduler = StageScheduler::new(
            runtime,
            Arc::clone(&store),
            config.log_batch_size,
            config.job_timeout,
        );
        let deployments = DeploymentController::new(deployer, Arc::clone(&store));

        Self {
            config,
            store,
            fetcher,
            scheduler,
            deployments,
        }
    }

    pub fn fetcher(&self) -> &dyn SourceFetcher {
        self.fetcher.as_ref()
    }

    /// Starts a run in the background
    ///
    /// The caller is not expected to await the handle; the outcome is
    /// observable through the store.
    pub fn spawn(self: &Arc<Self>, params: RunParams) -> JoinHandle<RunOutcome> {
        let runner = Arc::clone(self);
        let span = info_span!("pipeline", id = %params.pipeline_id);
        tokio::spawn(async move { runner.run(params).await }.instrument(span))
    }

    /// Runs a pipeline to completion
    pub async fn run(&self, params: RunParams) -> RunOutcome {
        info!(
            "Starting pipeline {} for {}@{} ({})",
            params.pipeline_id, params.repo_name, params.branch, params.commit_hash
        );
        self.set_pipeline_status(params.pipeline_id, PipelineStatus::Running)
            .await;

        let workspace = Workspace::allocate(
            &self.config.workspace_root,
            &params.repo_name,
            &params.commit_hash,
        );
        let outcome = self.execute(&params, &workspace).await;
        workspace.release(self.fetcher.as_ref()).await;

        self.set_pipeline_status(params.pipeline_id, outcome.pipeline)
            .await;
        info!(
            "Pipeline {} finished: {:?} (deployment: {:?})",
            params.pipeline_id, outcome.pipeline, outcome.deployment
        );

        outcome
    }

    async fn execute(&self, params: &RunParams, workspace: &Workspace) -> RunOutcome {
        let config = match self.prepare(params, workspace.path()).await {
            Ok(config) => config,
            Err(e) => {
                error!("Pipeline {} aborted: {}", params.pipeline_id, e);
                return RunOutcome::aborted();
            }
        };

        let job_ids = self.register_jobs(params.pipeline_id, &config).await;
        let deployment_id = best_effort(
            self.store.create_deployment(params.pipeline_id).await,
            "create deployment record",
        );

        // The pipeline budget covers the job phase only
        let deadline = Instant::now() + self.config.pipeline_timeout;
        let jobs_succeeded = self
            .scheduler
            .execute(
                &config,
                workspace.path(),
                params.pipeline_id,
                &job_ids,
                deadline,
            )
            .await;

        if !jobs_succeeded {
            return RunOutcome {
                pipeline: PipelineStatus::Failed,
                deployment: Some(DeploymentStatus::Pending),
            };
        }

        let deployment = self.deploy(params, workspace.path(), deployment_id).await;
        let pipeline = if deployment == DeploymentStatus::Success {
            PipelineStatus::Success
        } else {
            PipelineStatus::Failed
        };

        RunOutcome {
            pipeline,
            deployment: Some(deployment),
        }
    }

    /// Checks the source out and loads its pipeline configuration
    async fn prepare(&self, params: &RunParams, workspace: &Path) -> Result<PipelineConfig> {
        self.fetch(params, workspace).await?;
        Ok(parse_file(&workspace.join(&params.pipeline_filename))?)
    }

    /// Creates a pending record for every job; jobs whose record could not
    /// be created still run, their state just goes unrecorded
    async fn register_jobs(
        &self,
        pipeline_id: Uuid,
        config: &PipelineConfig,
    ) -> HashMap<String, Uuid> {
        let mut job_ids = HashMap::with_capacity(config.jobs.len());
        for job in config.jobs.values() {
            if let Some(job_id) = best_effort(
                self.store.create_job(pipeline_id, job).await,
                "create job record",
            ) {
                job_ids.insert(job.name.clone(), job_id);
            }
        }
        job_ids
    }

    async fn deploy(
        &self,
        params: &RunParams,
        workspace: &Path,
        deployment_id: Option<Uuid>,
    ) -> DeploymentStatus {
        self.set_deployment_status(deployment_id, DeploymentStatus::Deploying)
            .await;

        let project = self.project_name(params).await;
        let status = match self
            .deployments
            .execute(&project, params, workspace, deployment_id)
            .await
        {
            Ok(_) => DeploymentStatus::Success,
            Err(_) => self.rollback(&project, params, deployment_id).await,
        };

        self.set_deployment_status(deployment_id, status).await;
        status
    }

    /// Redeploys the project's last successful commit; attempted once
    async fn rollback(
        &self,
        project: &str,
        params: &RunParams,
        deployment_id: Option<Uuid>,
    ) -> DeploymentStatus {
        let last_success = match self.store.last_successful_pipeline(params.project_id).await {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => {
                warn!(
                    "No successful pipeline for project {}, skipping rollback",
                    params.project_id
                );
                return DeploymentStatus::Failed;
            }
            Err(e) => {
                warn!(
                    "Failed to look up last successful pipeline, skipping rollback: {}",
                    e
                );
                return DeploymentStatus::Failed;
            }
        };

        let rollback = params.for_rollback(&last_success.commit_hash);
        info!(
            "Rolling back {} to commit {} (pipeline {})",
            project, rollback.commit_hash, last_success.id
        );

        let workspace = Workspace::allocate(
            &self.config.workspace_root,
            &rollback.repo_name,
            &rollback.commit_hash,
        );
        let status = self
            .redeploy(project, &rollback, workspace.path(), deployment_id)
            .await;
        workspace.release(self.fetcher.as_ref()).await;

        status
    }

    async fn redeploy(
        &self,
        project: &str,
        rollback: &RunParams,
        workspace: &Path,
        deployment_id: Option<Uuid>,
    ) -> DeploymentStatus {
        if let Err(e) = self.fetch(rollback, workspace).await {
            error!(
                "Failed to fetch rollback commit {}: {}",
                rollback.commit_hash, e
            );
            return DeploymentStatus::Failed;
        }

        if let Some(deployment_id) = deployment_id {
            best_effort(
                self.store
                    .append_deployment_log(
                        deployment_id,
                        &format!("--- rolling back to commit {} ---", rollback.commit_hash),
                    )
                    .await,
                "store rollback marker",
            );
        }

        match self
            .deployments
            .execute(project, rollback, workspace, deployment_id)
            .await
        {
            Ok(_) => {
                info!("Rolled back to commit {}", rollback.commit_hash);
                DeploymentStatus::RolledBack
            }
            Err(_) => DeploymentStatus::Failed,
        }
    }

    async fn fetch(&self, params: &RunParams, dest: &Path) -> Result<()> {
        self.fetcher
            .fetch(
                &params.repo_url,
                &params.branch,
                dest,
                params.access_token.as_deref(),
                &params.commit_hash,
            )
            .await
    }

    /// Name the deployment is scoped under; the repository name stands in
    /// when the project cannot be loaded
    async fn project_name(&self, params: &RunParams) -> String {
        match self.store.get_project(params.project_id).await {
            Ok(Some(project)) => project.name,
            Ok(None) => params.repo_name.clone(),
            Err(e) => {
                warn!("Failed to load project {}: {}", params.project_id, e);
                params.repo_name.clone()
            }
        }
    }

    async fn set_pipeline_status(&self, pipeline_id: Uuid, status: PipelineStatus) {
        best_effort(
            self.store.update_pipeline_status(pipeline_id, status).await,
            "update pipeline status",
        );
    }

    async fn set_deployment_status(&self, deployment_id: Option<Uuid>, status: DeploymentStatus) {
        if let Some(deployment_id) = deployment_id {
            best_effort(
                self.store
                    .update_deployment_status(deployment_id, status)
                    .await,
                "update deployment status",
            );
        }
    }
}
