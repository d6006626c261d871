//! Pipeline DTOs

use serde::{Deserialize, Serialize};

use crate::domain::deployment::DeploymentRecord;
use crate::domain::job::JobRecord;
use crate::domain::pipeline::PipelineRecord;

/// Manual trigger request
///
/// When `commit` is omitted the current tip of `branch` is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerPipeline {
    pub branch: String,
    #[serde(default)]
    pub commit: Option<String>,
}

/// A pipeline with its jobs and deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDetails {
    pub pipeline: PipelineRecord,
    pub jobs: Vec<JobRecord>,
    pub deployment: Option<DeploymentRecord>,
}
