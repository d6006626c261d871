//! Stage scheduler
//!
//! Runs a pipeline's jobs stage by stage. Stages are a total order: every
//! job of a stage finishes before the next stage starts, and the first job
//! failure ends the pipeline. Jobs within a stage run sequentially in name
//! order.
//!
//! Job records move `Pending` -> `Running` (once the container is started)
//! -> `Success` / `Failed` from the exit code. Jobs whose image cannot be
//! pulled or whose container cannot start go straight to `Failed` with
//! [`SETUP_FAILURE_EXIT_CODE`].

use keel_core::domain::job::{JobStatus, SETUP_FAILURE_EXIT_CODE, TIMEOUT_EXIT_CODE};
use keel_core::domain::pipeline::{JobSpec, PipelineConfig};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::podman::{ContainerHandle, ContainerRuntime};
use crate::service::collect_logs;
use crate::store::{Store, best_effort};

/// Executes the job phase of a pipeline
pub struct StageScheduler {
    runtime: Arc<dyn ContainerRuntime>,
    store: Arc<dyn Store>,
    log_batch_size: usize,
    job_timeout: Duration,
}

impl StageScheduler {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn Store>,
        log_batch_size: usize,
        job_timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            store,
            log_batch_size,
            job_timeout,
        }
    }

    /// Runs every job of `config` against `workspace`
    ///
    /// `job_ids` maps job names to their pre-registered records. Returns
    /// `true` only if every job of every stage succeeded before `deadline`.
    pub async fn execute(
        &self,
        config: &PipelineConfig,
        workspace: &Path,
        pipeline_id: Uuid,
        job_ids: &HashMap<String, Uuid>,
        deadline: Instant,
    ) -> bool {
        for (idx, stage) in config.stages.iter().enumerate() {
            info!(
                "Pipeline {}: running stage {}/{}: {}",
                pipeline_id,
                idx + 1,
                config.stages.len(),
                stage
            );

            for job in config.jobs_in_stage(stage) {
                let job_id = job_ids.get(&job.name).copied();

                if !self.run_job(job, workspace, job_id, deadline).await {
                    error!(
                        "Pipeline {} stopped: job {} in stage {} failed",
                        pipeline_id, job.name, stage
                    );
                    return false;
                }
            }
        }

        info!("Pipeline {}: all jobs succeeded", pipeline_id);
        true
    }

    /// Runs a single job; returns whether it succeeded
    async fn run_job(
        &self,
        job: &JobSpec,
        workspace: &Path,
        job_id: Option<Uuid>,
        deadline: Instant,
    ) -> bool {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            error!("Pipeline deadline exhausted before job {} could start", job.name);
            self.record(job_id, JobStatus::Failed, Some(TIMEOUT_EXIT_CODE))
                .await;
            return false;
        }
        let limit = remaining.min(self.job_timeout);

        info!("Running job {} (image: {})", job.name, job.image);

        if let Err(e) = self.runtime.pull_image(&job.image).await {
            error!("Job {}: {}", job.name, e);
            self.record(job_id, JobStatus::Failed, Some(SETUP_FAILURE_EXIT_CODE))
                .await;
            return false;
        }

        let handle = match self.runtime.run_with_workspace(job, workspace).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to start job {}: {}", job.name, e);
                self.record(job_id, JobStatus::Failed, Some(SETUP_FAILURE_EXIT_CODE))
                    .await;
                return false;
            }
        };

        self.record(job_id, JobStatus::Running, None).await;

        let exit_code = self.supervise(job, &handle, job_id, limit).await;
        let status = JobStatus::from_exit_code(exit_code);
        self.record(job_id, status, Some(exit_code)).await;

        if status == JobStatus::Success {
            info!("Job {} completed successfully", job.name);
            true
        } else {
            error!("Job {} failed with exit code {}", job.name, exit_code);
            false
        }
    }

    /// Drains the container's logs while waiting for it to exit, then removes it
    async fn supervise(
        &self,
        job: &JobSpec,
        handle: &ContainerHandle,
        job_id: Option<Uuid>,
        limit: Duration,
    ) -> i32 {
        let logs = match self.runtime.stream_output(handle).await {
            Ok(output) => Some(tokio::spawn(collect_logs(
                output,
                Arc::clone(&self.store),
                job_id,
                self.log_batch_size,
            ))),
            Err(e) => {
                warn!("Failed to follow output of job {}: {}", job.name, e);
                None
            }
        };

        match tokio::time::timeout(limit, self.runtime.wait(handle)).await {
            Ok(Ok(exit_code)) => {
                // Let the log follower drain before the container goes away
                join_logs(&job.name, logs).await;
                self.remove(handle).await;
                exit_code
            }
            Ok(Err(e)) => {
                error!("Error waiting for container of job {}: {}", job.name, e);
                self.remove(handle).await;
                join_logs(&job.name, logs).await;
                SETUP_FAILURE_EXIT_CODE
            }
            Err(_) => {
                error!("Job {} exceeded its deadline of {:?}", job.name, limit);
                self.remove(handle).await;
                join_logs(&job.name, logs).await;
                TIMEOUT_EXIT_CODE
            }
        }
    }

    async fn remove(&self, handle: &ContainerHandle) {
        if let Err(e) = self.runtime.destroy(handle).await {
            warn!("Failed to remove container {}: {}", handle, e);
        }
    }

    async fn record(&self, job_id: Option<Uuid>, status: JobStatus, exit_code: Option<i32>) {
        if let Some(job_id) = job_id {
            best_effort(
                self.store.update_job_status(job_id, status, exit_code).await,
                "update job status",
            );
        }
    }
}

async fn join_logs(job: &str, logs: Option<JoinHandle<usize>>) {
    let Some(logs) = logs else {
        return;
    };
    match logs.await {
        Ok(lines) => info!("Collected {} log lines for job {}", lines, job),
        Err(e) => warn!("Log collection for job {} panicked: {}", job, e),
    }
}
