//! In-memory collaborators for engine tests

use async_trait::async_trait;
use bytes::Bytes;
use keel_core::domain::deployment::DeploymentStatus;
use keel_core::domain::job::JobStatus;
use keel_core::domain::pipeline::{JobSpec, PipelineConfig, PipelineRecord, PipelineStatus};
use keel_core::domain::project::Project;
use keel_core::domain::run::RunParams;
use keel_core::parser::parse_str;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::git::SourceFetcher;
use crate::podman::{ContainerHandle, ContainerRuntime, LogOutput, OutputStream};
use crate::service::Deployer;

pub const TEST_PROJECT_ID: Uuid = Uuid::from_u128(0x6b65_656c);

pub fn run_params(commit: &str) -> RunParams {
    RunParams {
        repo_url: "https://git.example.com/acme/shop.git".to_string(),
        repo_name: "shop".to_string(),
        branch: "main".to_string(),
        commit_hash: commit.to_string(),
        access_token: Some("s3cret".to_string()),
        pipeline_filename: ".gitlab-ci.yml".to_string(),
        deployment_filename: "docker-compose.yml".to_string(),
        project_id: TEST_PROJECT_ID,
        pipeline_id: Uuid::new_v4(),
    }
}

pub fn config_from(yaml: &str) -> PipelineConfig {
    parse_str(yaml).unwrap()
}

fn persistence_down() -> EngineError {
    EngineError::Persistence("database unavailable".to_string())
}

// ============================================================================
// Store
// ============================================================================

struct JobEntry {
    name: String,
    history: Vec<JobStatus>,
    exit_code: Option<i32>,
}

struct DeploymentEntry {
    pipeline_id: Uuid,
    history: Vec<DeploymentStatus>,
}

#[derive(Default)]
struct StoreState {
    pipelines: Vec<PipelineRecord>,
    pipeline_history: HashMap<Uuid, Vec<PipelineStatus>>,
    jobs: HashMap<Uuid, JobEntry>,
    job_logs: HashMap<Uuid, Vec<Vec<String>>>,
    deployments: HashMap<Uuid, DeploymentEntry>,
    deployment_logs: HashMap<Uuid, Vec<String>>,
    projects: HashMap<Uuid, Project>,
}

/// [`Store`](crate::store::Store) keeping everything in memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    failing_writes: bool,
    failing_lookups: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails
    pub fn failing_writes(mut self) -> Self {
        self.failing_writes = true;
        self
    }

    /// Looking up the last successful pipeline fails
    pub fn failing_lookups(mut self) -> Self {
        self.failing_lookups = true;
        self
    }

    pub fn with_project(self, project: Project) -> Self {
        self.state
            .lock()
            .unwrap()
            .projects
            .insert(project.id, project);
        self
    }

    /// Records an earlier successful pipeline of the test project at `commit`
    pub fn with_last_success(self, commit: &str) -> Self {
        let now = chrono::Utc::now();
        self.state.lock().unwrap().pipelines.push(PipelineRecord {
            id: Uuid::new_v4(),
            project_id: TEST_PROJECT_ID,
            branch: "main".to_string(),
            commit_hash: commit.to_string(),
            status: PipelineStatus::Success,
            created_at: now,
            updated_at: now,
        });
        self
    }

    /// Adds the pending pipeline record a trigger would create
    pub fn register_pipeline(&self, params: &RunParams) {
        let now = chrono::Utc::now();
        let mut state = self.state.lock().unwrap();
        state.pipelines.push(PipelineRecord {
            id: params.pipeline_id,
            project_id: params.project_id,
            branch: params.branch.clone(),
            commit_hash: params.commit_hash.clone(),
            status: PipelineStatus::Pending,
            created_at: now,
            updated_at: now,
        });
        state
            .pipeline_history
            .insert(params.pipeline_id, vec![PipelineStatus::Pending]);
    }

    pub fn pipeline_history(&self, pipeline_id: Uuid) -> Vec<PipelineStatus> {
        self.state
            .lock()
            .unwrap()
            .pipeline_history
            .get(&pipeline_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Status and exit code of the job named `name`
    pub fn job_state(&self, name: &str) -> (JobStatus, Option<i32>) {
        let state = self.state.lock().unwrap();
        let job = state
            .jobs
            .values()
            .find(|job| job.name == name)
            .unwrap_or_else(|| panic!("no job named {}", name));
        (*job.history.last().unwrap(), job.exit_code)
    }

    pub fn job_history(&self, name: &str) -> Vec<JobStatus> {
        let state = self.state.lock().unwrap();
        state
            .jobs
            .values()
            .find(|job| job.name == name)
            .map(|job| job.history.clone())
            .unwrap_or_else(|| panic!("no job named {}", name))
    }

    pub fn job_count(&self) -> usize {
        self.state.lock().unwrap().jobs.len()
    }

    pub fn log_batches(&self, job_id: Uuid) -> Vec<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .job_logs
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_log_batches(&self) -> usize {
        self.state.lock().unwrap().job_logs.values().map(Vec::len).sum()
    }

    /// Id of the deployment reserved for `pipeline_id`
    pub fn deployment_of(&self, pipeline_id: Uuid) -> Option<Uuid> {
        self.state
            .lock()
            .unwrap()
            .deployments
            .iter()
            .find(|(_, entry)| entry.pipeline_id == pipeline_id)
            .map(|(id, _)| *id)
    }

    pub fn deployment_history(&self, deployment_id: Uuid) -> Vec<DeploymentStatus> {
        self.state
            .lock()
            .unwrap()
            .deployments
            .get(&deployment_id)
            .map(|entry| entry.history.clone())
            .unwrap_or_default()
    }

    pub fn deployment_logs(&self, deployment_id: Uuid) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .deployment_logs
            .get(&deployment_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl crate::store::Store for MemoryStore {
    async fn update_pipeline_status(
        &self,
        pipeline_id: Uuid,
        status: PipelineStatus,
    ) -> Result<()> {
        if self.failing_writes {
            return Err(persistence_down());
        }
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.pipelines.iter_mut().find(|p| p.id == pipeline_id) {
            record.status = status;
            record.updated_at = chrono::Utc::now();
        }
        state
            .pipeline_history
            .entry(pipeline_id)
            .or_default()
            .push(status);
        Ok(())
    }

    async fn create_job(&self, _pipeline_id: Uuid, job: &JobSpec) -> Result<Uuid> {
        if self.failing_writes {
            return Err(persistence_down());
        }
        let id = Uuid::new_v4();
        self.state.lock().unwrap().jobs.insert(
            id,
            JobEntry {
                name: job.name.clone(),
                history: vec![JobStatus::Pending],
                exit_code: None,
            },
        );
        Ok(id)
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        exit_code: Option<i32>,
    ) -> Result<()> {
        if self.failing_writes {
            return Err(persistence_down());
        }
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| EngineError::Persistence(format!("job {} not found", job_id)))?;
        job.history.push(status);
        if exit_code.is_some() {
            job.exit_code = exit_code;
        }
        Ok(())
    }

    async fn append_job_logs(&self, job_id: Uuid, lines: Vec<String>) -> Result<()> {
        if self.failing_writes {
            return Err(persistence_down());
        }
        self.state
            .lock()
            .unwrap()
            .job_logs
            .entry(job_id)
            .or_default()
            .push(lines);
        Ok(())
    }

    async fn create_deployment(&self, pipeline_id: Uuid) -> Result<Uuid> {
        if self.failing_writes {
            return Err(persistence_down());
        }
        let id = Uuid::new_v4();
        self.state.lock().unwrap().deployments.insert(
            id,
            DeploymentEntry {
                pipeline_id,
                history: vec![DeploymentStatus::Pending],
            },
        );
        Ok(id)
    }

    async fn update_deployment_status(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
    ) -> Result<()> {
        if self.failing_writes {
            return Err(persistence_down());
        }
        let mut state = self.state.lock().unwrap();
        let entry = state.deployments.get_mut(&deployment_id).ok_or_else(|| {
            EngineError::Persistence(format!("deployment {} not found", deployment_id))
        })?;
        entry.history.push(status);
        Ok(())
    }

    async fn append_deployment_log(&self, deployment_id: Uuid, content: &str) -> Result<()> {
        if self.failing_writes {
            return Err(persistence_down());
        }
        self.state
            .lock()
            .unwrap()
            .deployment_logs
            .entry(deployment_id)
            .or_default()
            .push(content.to_string());
        Ok(())
    }

    async fn last_successful_pipeline(&self, project_id: Uuid) -> Result<Option<PipelineRecord>> {
        if self.failing_lookups {
            return Err(persistence_down());
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .pipelines
            .iter()
            .rev()
            .find(|p| p.project_id == project_id && p.status == PipelineStatus::Success)
            .cloned())
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .projects
            .get(&project_id)
            .cloned())
    }
}

// ============================================================================
// Container runtime
// ============================================================================

/// Outcome of interpreting a job script
struct Execution {
    output: Vec<String>,
    exit_code: i32,
    hangs: bool,
}

/// Runs a job script the way `sh -c "c1 && c2"` would, for a tiny command set:
/// `true`, `false`, `exit N`, `echo TEXT`, `seq N`, `cat FILE` (from the
/// workspace) and `sleep` (never finishes). Anything else succeeds silently.
fn interpret(script: &[String], workspace: &Path) -> Execution {
    let mut output = Vec::new();
    for command in script {
        let command = command.trim();
        let (program, arg) = command.split_once(' ').unwrap_or((command, ""));
        let exit_code = match program {
            "false" => 1,
            "exit" => arg.trim().parse().unwrap_or(1),
            "echo" => {
                output.push(arg.to_string());
                0
            }
            "seq" => match arg.trim().parse::<u32>() {
                Ok(last) => {
                    output.extend((1..=last).map(|n| n.to_string()));
                    0
                }
                Err(_) => 1,
            },
            "cat" => match std::fs::read_to_string(workspace.join(arg.trim())) {
                Ok(content) => {
                    output.extend(content.lines().map(str::to_string));
                    0
                }
                Err(_) => 1,
            },
            "sleep" => {
                return Execution {
                    output,
                    exit_code: 0,
                    hangs: true,
                };
            }
            _ => 0,
        };
        if exit_code != 0 {
            return Execution {
                output,
                exit_code,
                hangs: false,
            };
        }
    }
    Execution {
        output,
        exit_code: 0,
        hangs: false,
    }
}

type OutputPipe = mpsc::Receiver<std::io::Result<LogOutput>>;

/// A started fake container
///
/// Its output is produced by a task writing into a one-slot channel, so like
/// a process blocked on a full pipe the container cannot exit before its
/// output has been read.
struct Container {
    image: String,
    exit_code: i32,
    hangs: bool,
    output: Option<OutputPipe>,
    drained: watch::Receiver<bool>,
}

/// Writes `lines` alternately to stdout and stderr, then reports the output drained
fn produce_output(lines: Vec<String>) -> (OutputPipe, watch::Receiver<bool>) {
    let (tx, rx) = mpsc::channel(1);
    let (drained_tx, drained_rx) = watch::channel(false);

    tokio::spawn(async move {
        for (idx, line) in lines.into_iter().enumerate() {
            let bytes = Bytes::from(format!("{}\n", line));
            let chunk = if idx % 2 == 0 {
                LogOutput::StdOut(bytes)
            } else {
                LogOutput::StdErr(bytes)
            };
            if tx.send(Ok(chunk)).await.is_err() {
                break;
            }
        }
        let _ = drained_tx.send(true);
    });

    (rx, drained_rx)
}

/// Scripted [`ContainerRuntime`]
#[derive(Default)]
pub struct FakeRuntime {
    missing_images: HashSet<String>,
    broken_images: HashSet<String>,
    unwaitable_images: HashSet<String>,
    containers: Mutex<HashMap<String, Container>>,
    started: Mutex<Vec<String>>,
    destroyed: Mutex<Vec<ContainerHandle>>,
    workspaces: Mutex<Vec<PathBuf>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulling `image` fails
    pub fn with_missing_image(mut self, image: &str) -> Self {
        self.missing_images.insert(image.to_string());
        self
    }

    /// Containers of `image` fail to start
    pub fn with_broken_image(mut self, image: &str) -> Self {
        self.broken_images.insert(image.to_string());
        self
    }

    /// Waiting on containers of `image` fails
    pub fn with_unwaitable_image(mut self, image: &str) -> Self {
        self.unwaitable_images.insert(image.to_string());
        self
    }

    /// Names of jobs whose container was started, in start order
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn destroyed(&self) -> Vec<ContainerHandle> {
        self.destroyed.lock().unwrap().clone()
    }

    /// Workspaces mounted into started containers
    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.workspaces.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn pull_image(&self, image: &str) -> Result<()> {
        if self.missing_images.contains(image) {
            return Err(EngineError::Image {
                image: image.to_string(),
                reason: "manifest unknown".to_string(),
            });
        }
        Ok(())
    }

    async fn run_with_workspace(
        &self,
        job: &JobSpec,
        workspace: &Path,
    ) -> Result<ContainerHandle> {
        if self.broken_images.contains(&job.image) {
            return Err(EngineError::Container(format!(
                "cannot start container for {}",
                job.image
            )));
        }

        let handle = ContainerHandle(format!("fake-{}", Uuid::new_v4()));
        let execution = interpret(&job.script, workspace);
        let (output, drained) = produce_output(execution.output);
        self.containers.lock().unwrap().insert(
            handle.0.clone(),
            Container {
                image: job.image.clone(),
                exit_code: execution.exit_code,
                hangs: execution.hangs,
                output: Some(output),
                drained,
            },
        );
        self.started.lock().unwrap().push(job.name.clone());
        self.workspaces.lock().unwrap().push(workspace.to_path_buf());
        Ok(handle)
    }

    async fn stream_output(&self, handle: &ContainerHandle) -> Result<OutputStream> {
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(&handle.0)
            .ok_or_else(|| EngineError::Container(format!("no such container {}", handle)))?;
        let output = container
            .output
            .take()
            .ok_or_else(|| EngineError::Container(format!("{} is already followed", handle)))?;
        Ok(Box::pin(ReceiverStream::new(output)))
    }

    async fn wait(&self, handle: &ContainerHandle) -> Result<i32> {
        let (image, exit_code, hangs, mut drained) = {
            let containers = self.containers.lock().unwrap();
            let container = containers
                .get(&handle.0)
                .ok_or_else(|| EngineError::Container(format!("no such container {}", handle)))?;
            (
                container.image.clone(),
                container.exit_code,
                container.hangs,
                container.drained.clone(),
            )
        };

        if self.unwaitable_images.contains(&image) {
            return Err(EngineError::Container("wait interrupted".to_string()));
        }
        if drained.wait_for(|done| *done).await.is_err() {
            return Err(EngineError::Container(format!("{} vanished", handle)));
        }
        if hangs {
            std::future::pending::<()>().await;
        }
        Ok(exit_code)
    }

    async fn destroy(&self, handle: &ContainerHandle) -> Result<()> {
        self.containers.lock().unwrap().remove(&handle.0);
        self.destroyed.lock().unwrap().push(handle.clone());
        Ok(())
    }
}

// ============================================================================
// Source fetcher
// ============================================================================

/// [`SourceFetcher`] materialising scripted file sets per commit
///
/// Every checkout also gets a `.commit` file holding the fetched commit.
#[derive(Default)]
pub struct FakeFetcher {
    commits: HashMap<String, Vec<(String, String)>>,
    failing: HashSet<String>,
    latency: Duration,
    fetches: Mutex<Vec<String>>,
    cleanups: Mutex<Vec<PathBuf>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit(mut self, commit: &str, files: &[(&str, &str)]) -> Self {
        self.commits.insert(
            commit.to_string(),
            files
                .iter()
                .map(|(name, content)| (name.to_string(), content.to_string()))
                .collect(),
        );
        self
    }

    /// Every fetch takes at least `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fetching `commit` fails
    pub fn failing_for(mut self, commit: &str) -> Self {
        self.failing.insert(commit.to_string());
        self
    }

    /// Commits fetched so far, in order
    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn cleanups(&self) -> Vec<PathBuf> {
        self.cleanups.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(
        &self,
        _repo_url: &str,
        _branch: &str,
        dest: &Path,
        _token: Option<&str>,
        commit: &str,
    ) -> Result<()> {
        self.fetches.lock().unwrap().push(commit.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing.contains(commit) {
            return Err(EngineError::Fetch(format!("cannot fetch {}", commit)));
        }
        let files = self
            .commits
            .get(commit)
            .ok_or_else(|| EngineError::Fetch(format!("unknown commit {}", commit)))?;

        tokio::fs::create_dir_all(dest).await?;
        for (name, content) in files {
            tokio::fs::write(dest.join(name), content).await?;
        }
        tokio::fs::write(dest.join(".commit"), commit).await?;
        Ok(())
    }

    async fn resolve_head(
        &self,
        _repo_url: &str,
        branch: &str,
        _token: Option<&str>,
    ) -> Result<String> {
        Err(EngineError::Fetch(format!("unknown branch {}", branch)))
    }

    async fn cleanup(&self, path: &Path) -> Result<()> {
        self.cleanups.lock().unwrap().push(path.to_path_buf());
        match tokio::fs::remove_dir_all(path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Deployer
// ============================================================================

/// [`Deployer`] whose outcome is scripted per checked-out commit
#[derive(Default)]
pub struct FakeDeployer {
    failing: HashSet<String>,
    projects: Mutex<Vec<String>>,
    commits: Mutex<Vec<String>>,
}

impl FakeDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploying a workspace holding `commit` fails
    pub fn failing_for(mut self, commit: &str) -> Self {
        self.failing.insert(commit.to_string());
        self
    }

    pub fn projects(&self) -> Vec<String> {
        self.projects.lock().unwrap().clone()
    }

    /// Commits deployed so far, in order
    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn deploy(&self, project: &str, workspace: &Path, _descriptor: &str) -> Result<String> {
        let commit = std::fs::read_to_string(workspace.join(".commit")).unwrap_or_default();
        self.projects.lock().unwrap().push(project.to_string());
        self.commits.lock().unwrap().push(commit.clone());

        if self.failing.contains(&commit) {
            return Err(EngineError::Deployment {
                reason: "compose exited with code 1".to_string(),
                output: format!("error: cannot deploy {}", commit),
            });
        }
        Ok(format!("deployed {} as {}", commit, project))
    }
}
