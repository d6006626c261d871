//! Run parameters

use std::fmt;
use uuid::Uuid;

use crate::domain::pipeline::PipelineRecord;
use crate::domain::project::Project;

/// Fully-resolved context for one pipeline execution
///
/// Built once per trigger and passed by value through the run. The only
/// derived form is [`RunParams::for_rollback`], which copies it with a
/// different commit.
#[derive(Clone, PartialEq, Eq)]
pub struct RunParams {
    pub repo_url: String,
    pub repo_name: String,
    pub branch: String,
    pub commit_hash: String,
    pub access_token: Option<String>,
    pub pipeline_filename: String,
    pub deployment_filename: String,
    pub project_id: Uuid,
    pub pipeline_id: Uuid,
}

impl RunParams {
    /// Assembles run parameters for a pipeline record of a project
    pub fn from_project(project: &Project, pipeline: &PipelineRecord) -> Self {
        Self {
            repo_url: project.repo_url.clone(),
            repo_name: project.name.clone(),
            branch: pipeline.branch.clone(),
            commit_hash: pipeline.commit_hash.clone(),
            access_token: project.access_token.clone(),
            pipeline_filename: project.pipeline_filename.clone(),
            deployment_filename: project.deployment_filename.clone(),
            project_id: project.id,
            pipeline_id: pipeline.id,
        }
    }

    /// Copy of these parameters targeting another commit
    pub fn for_rollback(&self, commit_hash: &str) -> Self {
        Self {
            commit_hash: commit_hash.to_string(),
            ..self.clone()
        }
    }
}

// Keeps the access token out of logs.
impl fmt::Debug for RunParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunParams")
            .field("repo_url", &self.repo_url)
            .field("repo_name", &self.repo_name)
            .field("branch", &self.branch)
            .field("commit_hash", &self.commit_hash)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("pipeline_filename", &self.pipeline_filename)
            .field("deployment_filename", &self.deployment_filename)
            .field("project_id", &self.project_id)
            .field("pipeline_id", &self.pipeline_id)
            .finish()
    }
}
