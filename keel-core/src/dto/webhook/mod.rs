//! Push webhook payload
//!
//! Subset of the GitHub / Gitea push event used to start a pipeline.

use serde::{Deserialize, Serialize};

const BRANCH_REF_PREFIX: &str = "refs/heads/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Commit the ref points to after the push
    pub after: String,
    pub repository: PushRepository,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRepository {
    pub name: String,
    pub clone_url: String,
}

impl PushEvent {
    /// Branch name, or `None` for tags and other refs
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix(BRANCH_REF_PREFIX)
    }

    /// A deleted ref is reported with an all-zero `after` hash
    pub fn is_deletion(&self) -> bool {
        !self.after.is_empty() && self.after.chars().all(|c| c == '0')
    }
}
