//! Deployment service
//!
//! Brings a workspace's deployment descriptor up as a compose project named
//! after the sanitized project name. Output is captured and persisted
//! whether the deployment succeeds or not.

use async_trait::async_trait;
use keel_core::domain::run::RunParams;
use keel_core::sanitize::project_slug;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::store::{Store, best_effort};

/// Performs the environment-level deployment action
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Deploys `descriptor` (relative to `workspace`) as project `project`
    ///
    /// Returns the combined output. Failures are reported as
    /// [`EngineError::Deployment`] carrying whatever output was produced.
    async fn deploy(&self, project: &str, workspace: &Path, descriptor: &str) -> Result<String>;
}

/// [`Deployer`] running `<bin> compose -p <project> -f <descriptor> up -d --build`
#[derive(Debug, Clone)]
pub struct ComposeDeployer {
    bin: String,
}

impl ComposeDeployer {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl Deployer for ComposeDeployer {
    async fn deploy(&self, project: &str, workspace: &Path, descriptor: &str) -> Result<String> {
        if !workspace.join(descriptor).exists() {
            return Err(EngineError::Deployment {
                reason: format!("deployment descriptor {} not found", descriptor),
                output: String::new(),
            });
        }

        debug!(
            "Running {} compose -p {} -f {} up -d --build",
            self.bin, project, descriptor
        );

        let output = Command::new(&self.bin)
            .args(["compose", "-p", project, "-f", descriptor, "up", "-d", "--build"])
            .current_dir(workspace)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::Deployment {
                reason: format!("failed to execute {} compose: {}", self.bin, e),
                output: String::new(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(EngineError::Deployment {
                reason: format!(
                    "compose exited with code {}",
                    output.status.code().unwrap_or(-1)
                ),
                output: combined,
            });
        }

        Ok(combined)
    }
}

/// Runs deployments and records their output
pub struct DeploymentController {
    deployer: Arc<dyn Deployer>,
    store: Arc<dyn Store>,
}

impl DeploymentController {
    pub fn new(deployer: Arc<dyn Deployer>, store: Arc<dyn Store>) -> Self {
        Self { deployer, store }
    }

    /// Deploys `workspace` for `project` using the descriptor named in `params`
    ///
    /// The deployment's output is appended to the deployment log (when a
    /// deployment record exists) on success and on failure.
    pub async fn execute(
        &self,
        project: &str,
        params: &RunParams,
        workspace: &Path,
        deployment_id: Option<Uuid>,
    ) -> Result<String> {
        let mut compose_project = project_slug(project);
        if compose_project.is_empty() {
            compose_project = project_slug(&params.repo_name);
        }
        if compose_project.is_empty() {
            compose_project = "keel".to_string();
        }

        info!(
            "Deploying commit {} as compose project {} using {}",
            params.commit_hash, compose_project, params.deployment_filename
        );

        let result = self
            .deployer
            .deploy(&compose_project, workspace, &params.deployment_filename)
            .await;

        let output = match &result {
            Ok(output) => Some(output.as_str()).filter(|o| !o.is_empty()),
            Err(e) => e.deployment_output(),
        };

        if let (Some(deployment_id), Some(output)) = (deployment_id, output) {
            best_effort(
                self.store.append_deployment_log(deployment_id, output).await,
                "store deployment logs",
            );
        }

        match &result {
            Ok(_) => info!("Deployment of {} succeeded", params.commit_hash),
            Err(e) => error!("Deployment of {} failed: {}", params.commit_hash, e),
        }

        result
    }
}
