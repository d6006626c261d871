//! Service layer
//!
//! Services contain the engine's business logic: collecting container logs
//! and performing deployments. Collaborators are trait objects so they can
//! be swapped for testing and dependency injection.

pub mod deployment;
pub mod log_buffer;
pub mod log_stream;

// Re-export traits
pub use deployment::Deployer;

// Re-export implementations
pub use deployment::{ComposeDeployer, DeploymentController};
pub use log_stream::collect_logs;
