//! Podman container management
//!
//! Handles container lifecycle for job execution:
//! - Checking podman availability
//! - Pulling job images
//! - Starting one container per job with the workspace mounted
//! - Following the container's combined output
//!
//! Job scripts send stderr to stdout inside the container, and the log
//! follower writes both of its channels into one pipe, so output reaches
//! the engine in the order the job wrote it.
//! - Waiting for exit and removing the container

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use keel_core::domain::pipeline::JobSpec;
use std::path::Path;
use std::pin::Pin;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Path the workspace is mounted at inside every job container
pub const CONTAINER_WORKSPACE: &str = "/workspace";

/// Identifier of a started container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(pub String);

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One chunk of container output, tagged with the channel it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    StdOut(Bytes),
    StdErr(Bytes),
}

impl LogOutput {
    pub fn into_bytes(self) -> Bytes {
        match self {
            LogOutput::StdOut(bytes) | LogOutput::StdErr(bytes) => bytes,
        }
    }
}

/// Live, multiplexed stdout/stderr of a container; ends when the container exits
pub type OutputStream = Pin<Box<dyn Stream<Item = std::io::Result<LogOutput>> + Send>>;

/// Container engine operations needed to run a job
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Blocks until the image is available locally
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Creates and starts the job's container without waiting for it
    ///
    /// The script runs under `/bin/sh -c` as `exec 2>&1; c1 && c2 && ...`, with the
    /// workspace bind-mounted read-write at [`CONTAINER_WORKSPACE`], which is
    /// also the working directory.
    async fn run_with_workspace(&self, job: &JobSpec, workspace: &Path)
    -> Result<ContainerHandle>;

    /// Follows the container's output until it exits
    async fn stream_output(&self, handle: &ContainerHandle) -> Result<OutputStream>;

    /// Blocks until the container has stopped and returns its exit code
    async fn wait(&self, handle: &ContainerHandle) -> Result<i32>;

    /// Force-removes the container; removing a missing container succeeds
    async fn destroy(&self, handle: &ContainerHandle) -> Result<()>;
}

/// Checks if the container runtime is installed and available
pub async fn check_podman_available(bin: &str) -> Result<()> {
    let output = Command::new(bin)
        .arg("--version")
        .output()
        .await
        .map_err(|e| {
            EngineError::Container(format!(
                "Failed to execute '{} --version'. Is it installed? {}",
                bin, e
            ))
        })?;

    if !output.status.success() {
        return Err(EngineError::Container(format!(
            "{} is not working correctly",
            bin
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!("Container runtime is available: {}", version.trim());

    Ok(())
}

/// [`ContainerRuntime`] backed by the podman CLI
#[derive(Debug, Clone)]
pub struct PodmanRuntime {
    bin: String,
}

impl PodmanRuntime {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn podman(&self, args: &[String]) -> std::io::Result<Output> {
        debug!("Running {} {}", self.bin, args.join(" "));
        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
    }

    /// Builds the `run` arguments for a job
    fn run_args(job: &JobSpec, workspace: &Path) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--pull=never".to_string(),
            "--name".to_string(),
            format!("keel-{}", Uuid::new_v4()),
            // Override entrypoint to handle images with custom entrypoints (like alpine/git)
            "--entrypoint".to_string(),
            "/bin/sh".to_string(),
            "-v".to_string(),
            format!("{}:{}", workspace.display(), CONTAINER_WORKSPACE),
            "-w".to_string(),
            CONTAINER_WORKSPACE.to_string(),
        ];

        for (key, value) in &job.variables {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(job.image.clone());
        args.push("-c".to_string());
        args.push(format!("exec 2>&1; {}", job.shell_script()));
        args
    }
}

fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    format!(
        "exit_code={}, stdout='{}', stderr='{}'",
        output.status.code().unwrap_or(-1),
        stdout.trim(),
        stderr.trim()
    )
}

#[async_trait]
impl ContainerRuntime for PodmanRuntime {
    async fn pull_image(&self, image: &str) -> Result<()> {
        info!("Pulling image {}", image);

        let output = self
            .podman(&["pull".to_string(), "--quiet".to_string(), image.to_string()])
            .await
            .map_err(|e| EngineError::Image {
                image: image.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(EngineError::Image {
                image: image.to_string(),
                reason: describe_failure(&output),
            });
        }

        debug!("Image {} pulled", image);
        Ok(())
    }

    async fn run_with_workspace(
        &self,
        job: &JobSpec,
        workspace: &Path,
    ) -> Result<ContainerHandle> {
        info!("Starting container for job {} (image {})", job.name, job.image);

        let output = self
            .podman(&Self::run_args(job, workspace))
            .await
            .map_err(|e| EngineError::Container(format!("Failed to execute podman run: {}", e)))?;

        if !output.status.success() {
            return Err(EngineError::Container(format!(
                "Failed to start container for image {}: {}",
                job.image,
                describe_failure(&output)
            )));
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if container_id.is_empty() {
            return Err(EngineError::Container(
                "podman run returned no container id".to_string(),
            ));
        }

        info!("Container {} started for job {}", container_id, job.name);
        Ok(ContainerHandle(container_id))
    }

    async fn stream_output(&self, handle: &ContainerHandle) -> Result<OutputStream> {
        // Both channels of the follower share one pipe
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg("exec \"$0\" logs --follow \"$1\" 2>&1")
            .arg(&self.bin)
            .arg(&handle.0)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Container(format!("Failed to follow logs: {}", e)))?;

        let Some(stdout) = child.stdout.take() else {
            return Err(EngineError::Container(
                "podman logs did not expose its output pipe".to_string(),
            ));
        };

        // Reap the log follower once the container stops
        let container = handle.0.clone();
        tokio::spawn(async move {
            if let Err(e) = child.wait().await {
                warn!("Log follower for container {} failed: {}", container, e);
            }
        });

        Ok(Box::pin(
            ReaderStream::new(stdout).map(|chunk| chunk.map(LogOutput::StdOut)),
        ))
    }

    async fn wait(&self, handle: &ContainerHandle) -> Result<i32> {
        let output = self
            .podman(&["wait".to_string(), handle.0.clone()])
            .await
            .map_err(|e| EngineError::Container(format!("Failed to execute podman wait: {}", e)))?;

        if !output.status.success() {
            return Err(EngineError::Container(format!(
                "Failed to wait for container {}: {}",
                handle,
                describe_failure(&output)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.trim().parse::<i32>().map_err(|e| {
            EngineError::Container(format!(
                "Unexpected exit status '{}' for container {}: {}",
                stdout.trim(),
                handle,
                e
            ))
        })
    }

    async fn destroy(&self, handle: &ContainerHandle) -> Result<()> {
        debug!("Removing container {}", handle);

        let output = self
            .podman(&[
                "rm".to_string(),
                "--force".to_string(),
                "--ignore".to_string(),
                handle.0.clone(),
            ])
            .await
            .map_err(|e| EngineError::Container(format!("Failed to execute podman rm: {}", e)))?;

        if !output.status.success() {
            return Err(EngineError::Container(format!(
                "Failed to remove container {}: {}",
                handle,
                describe_failure(&output)
            )));
        }

        debug!("Container {} removed", handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::collect_logs;
    use crate::testing::MemoryStore;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// Stand-in podman whose `logs` alternates between stdout and stderr
    #[cfg(unix)]
    fn scripted_podman(dir: &Path) -> PodmanRuntime {
        use std::os::unix::fs::PermissionsExt;

        let bin = dir.join("podman");
        std::fs::write(
            &bin,
            "#!/bin/sh\n\
             [ \"$1\" = logs ] || exit 2\n\
             echo o1; echo e1 >&2; echo o2; echo e2 >&2; echo o3; echo e3 >&2\n",
        )
        .unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        PodmanRuntime::new(bin.to_string_lossy())
    }

    #[test]
    fn test_run_args() {
        let mut variables = BTreeMap::new();
        variables.insert("CI".to_string(), "true".to_string());
        let job = JobSpec {
            name: "unit".to_string(),
            stage: "test".to_string(),
            image: "rust:1.85".to_string(),
            script: vec!["cargo build".to_string(), "cargo test".to_string()],
            variables,
        };

        let args = PodmanRuntime::run_args(&job, Path::new("/tmp/ws"));

        assert_eq!(args[0], "run");
        assert!(args.contains(&"/tmp/ws:/workspace".to_string()));
        assert!(args.contains(&"CI=true".to_string()));
        let image_pos = args.iter().position(|a| a == "rust:1.85").unwrap();
        assert_eq!(args[image_pos + 1], "-c");
        assert_eq!(args[image_pos + 2], "exec 2>&1; cargo build && cargo test");
        assert_eq!(args.len(), image_pos + 3);
    }

    #[test]
    fn test_log_output_into_bytes() {
        assert_eq!(
            LogOutput::StdErr(Bytes::from_static(b"oops")).into_bytes(),
            Bytes::from_static(b"oops")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_followed_output_keeps_write_order_across_channels() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = scripted_podman(dir.path());
        let store = Arc::new(MemoryStore::new());
        let job_id = Uuid::new_v4();

        let output = runtime
            .stream_output(&ContainerHandle("c0ffee".to_string()))
            .await
            .unwrap();
        let collected = collect_logs(output, store.clone(), Some(job_id), 10).await;

        assert_eq!(collected, 6);
        assert_eq!(
            store.log_batches(job_id).concat(),
            vec!["o1", "e1", "o2", "e2", "o3", "e3"]
        );
    }
}
