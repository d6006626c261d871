//! Project domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default pipeline configuration filename
pub const DEFAULT_PIPELINE_FILENAME: &str = ".gitlab-ci.yml";

/// Default deployment descriptor filename
pub const DEFAULT_DEPLOYMENT_FILENAME: &str = "docker-compose.yml";

/// A repository registered for CI/CD
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub repo_url: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub pipeline_filename: String,
    pub deployment_filename: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
