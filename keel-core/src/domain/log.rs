//! Log domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of container output captured for a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub job_id: Uuid,
    /// Position of the line within the job's output
    pub seq: i64,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A block of deployment output (compose output, rollback markers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentLog {
    pub deployment_id: Uuid,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
