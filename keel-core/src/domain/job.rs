//! Job domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exit code recorded for a job that never ran (image pull or start failure)
pub const SETUP_FAILURE_EXIT_CODE: i32 = 1;

/// Exit code recorded for a job killed at its deadline
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Job execution record
///
/// Pre-registered as `Pending` before the pipeline's jobs run, then
/// updated only by the task executing that job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub name: String,
    pub stage: String,
    pub image: String,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    /// Terminal status for a container exit code
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 { Self::Success } else { Self::Failed }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_exit_code() {
        assert_eq!(JobStatus::from_exit_code(0), JobStatus::Success);
        assert_eq!(JobStatus::from_exit_code(1), JobStatus::Failed);
        assert_eq!(JobStatus::from_exit_code(137), JobStatus::Failed);
        assert_eq!(JobStatus::from_exit_code(-1), JobStatus::Failed);
    }
}
