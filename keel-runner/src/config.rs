//! Engine configuration
//!
//! Defines all configurable parameters for pipeline execution including
//! workspace location, log batching, deadlines and the external binaries used.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration
///
/// All deadlines are configurable to allow tuning for different
/// deployment scenarios (fast unit pipelines vs long image builds).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory under which per-run workspaces are created
    pub workspace_root: PathBuf,

    /// Number of log lines persisted per batch
    pub log_batch_size: usize,

    /// Maximum time a single job container may run
    pub job_timeout: Duration,

    /// Maximum time for the whole job phase of a pipeline
    pub pipeline_timeout: Duration,

    /// Container runtime CLI (e.g., "podman")
    pub container_bin: String,

    /// Binary providing the `compose` subcommand used for deployments
    pub compose_bin: String,
}

impl EngineConfig {
    /// Creates a new configuration with defaults
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            log_batch_size: 10,
            job_timeout: Duration::from_secs(3600),
            pipeline_timeout: Duration::from_secs(7200),
            container_bin: "podman".to_string(),
            compose_bin: "podman".to_string(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognised environment variables (all optional):
    /// - KEEL_WORKSPACE_ROOT (default: <tmp>/keel-workspaces)
    /// - KEEL_LOG_BATCH_SIZE (default: 10)
    /// - KEEL_JOB_TIMEOUT (seconds, default: 3600)
    /// - KEEL_PIPELINE_TIMEOUT (seconds, default: 7200)
    /// - KEEL_CONTAINER_BIN (default: podman)
    /// - KEEL_COMPOSE_BIN (default: podman)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let workspace_root = std::env::var("KEEL_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.workspace_root);

        let log_batch_size = std::env::var("KEEL_LOG_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.log_batch_size);

        let job_timeout = std::env::var("KEEL_JOB_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.job_timeout);

        let pipeline_timeout = std::env::var("KEEL_PIPELINE_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.pipeline_timeout);

        let container_bin =
            std::env::var("KEEL_CONTAINER_BIN").unwrap_or(defaults.container_bin);

        let compose_bin = std::env::var("KEEL_COMPOSE_BIN").unwrap_or(defaults.compose_bin);

        Self {
            workspace_root,
            log_batch_size,
            job_timeout,
            pipeline_timeout,
            container_bin,
            compose_bin,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workspace_root.as_os_str().is_empty() {
            anyhow::bail!("workspace_root cannot be empty");
        }

        if self.log_batch_size == 0 {
            anyhow::bail!("log_batch_size must be greater than 0");
        }

        if self.job_timeout.is_zero() {
            anyhow::bail!("job_timeout must be greater than 0");
        }

        if self.pipeline_timeout.is_zero() {
            anyhow::bail!("pipeline_timeout must be greater than 0");
        }

        if self.container_bin.trim().is_empty() {
            anyhow::bail!("container_bin cannot be empty");
        }

        if self.compose_bin.trim().is_empty() {
            anyhow::bail!("compose_bin cannot be empty");
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("keel-workspaces"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.log_batch_size, 10);
        assert_eq!(config.job_timeout, Duration::from_secs(3600));
        assert_eq!(config.container_bin, "podman");
        assert!(config.workspace_root.ends_with("keel-workspaces"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        config.log_batch_size = 0;
        assert!(config.validate().is_err());
        config.log_batch_size = 1;
        assert!(config.validate().is_ok());

        config.job_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.job_timeout = Duration::from_secs(1);

        config.compose_bin = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
