//! Error types for the execution engine

use keel_core::parser::ConfigError;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while running a pipeline
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source could not be fetched (network, auth, missing ref)
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Pipeline configuration missing or invalid
    #[error("Invalid pipeline config: {0}")]
    Config(#[from] ConfigError),

    /// Image pull failed
    #[error("Failed to pull image {image}: {reason}")]
    Image { image: String, reason: String },

    /// Container create/start/wait/remove failed
    #[error("Container error: {0}")]
    Container(String),

    /// Deployment process could not start or exited non-zero
    #[error("Deployment failed: {reason}")]
    Deployment {
        reason: String,
        /// Combined output captured before the failure
        output: String,
    },

    /// Storage unavailable or write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Output captured by a failed deployment, if any
    pub fn deployment_output(&self) -> Option<&str> {
        match self {
            Self::Deployment { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }
}
