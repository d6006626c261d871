//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories and the pipeline runner.

pub mod log;
pub mod pipeline;
pub mod project;

// Re-export for convenience
pub use log as log_service;
pub use pipeline as pipeline_service;
pub use project as project_service;
