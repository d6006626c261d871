//! Project DTOs

use serde::{Deserialize, Serialize};

/// Request to register a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub repo_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub pipeline_filename: Option<String>,
    #[serde(default)]
    pub deployment_filename: Option<String>,
}
