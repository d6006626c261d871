//! Deployment domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deployment record, reserved (as `Pending`) before a pipeline's jobs run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub status: DeploymentStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Deployment status
///
/// `Pending` -> `Deploying` -> one of `Success`, `Failed`, `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Deploying,
    Success,
    Failed,
    RolledBack,
}
