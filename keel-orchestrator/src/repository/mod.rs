//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles database operations for a specific domain entity.

pub mod deployment;
pub mod job;
pub mod log;
pub mod pipeline;
pub mod project;

// Re-export for convenience
pub use deployment as deployment_repository;
pub use job as job_repository;
pub use log as log_repository;
pub use pipeline as pipeline_repository;
pub use project as project_repository;
