//! Pipeline domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Parsed pipeline configuration
///
/// Stages are a total order. Every job's stage appears in `stages`
/// (enforced by the parser). Jobs are keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub stages: Vec<String>,
    pub jobs: BTreeMap<String, JobSpec>,
}

impl PipelineConfig {
    /// Jobs belonging to the given stage, in name order
    pub fn jobs_in_stage<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a JobSpec> + 'a {
        self.jobs.values().filter(move |job| job.stage == stage)
    }
}

/// A single job definition: one container invocation running a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub stage: String,
    pub image: String,
    /// Commands run in order; the first failing command ends the job
    pub script: Vec<String>,
    pub variables: BTreeMap<String, String>,
}

impl JobSpec {
    /// Renders the script for `/bin/sh -c`
    ///
    /// Commands are chained with `&&` so that execution stops at the first
    /// command exiting non-zero and the shell exits with that status.
    pub fn shell_script(&self) -> String {
        self.script.join(" && ")
    }
}

/// Persisted pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub branch: String,
    pub commit_hash: String,
    pub status: PipelineStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Pipeline run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl PipelineStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }
}
