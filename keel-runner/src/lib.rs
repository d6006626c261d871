//! Keel Runner
//!
//! The pipeline execution engine. Turns a checked-out repository and its
//! pipeline configuration into an ordered sequence of container runs,
//! captures their output, and deploys the result with a single rollback
//! attempt on failure.
//!
//! Architecture:
//! - Configuration: engine settings from environment or defaults
//! - Collaborators: container runtime, source fetcher, deployer and store
//!   behind traits, with podman/git/compose implementations
//! - Services: log collection and deployments
//! - Scheduler: stage-ordered, fail-fast job execution
//! - Orchestrator: the per-run driver, including rollback

pub mod config;
pub mod error;
pub mod git;
pub mod orchestrator;
pub mod podman;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use git::{GitFetcher, SourceFetcher};
pub use orchestrator::{PipelineRunner, RunOutcome};
pub use podman::{ContainerRuntime, PodmanRuntime, check_podman_available};
pub use service::{ComposeDeployer, Deployer};
pub use store::Store;
