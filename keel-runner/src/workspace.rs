//! Per-run workspaces
//!
//! Every run (and every rollback attempt) checks its source out into its own
//! directory, named from the repository, a commit prefix and a timestamp so
//! concurrent runs of the same project never collide.
//!
//! Release is explicit and async through the source fetcher. If a run
//! unwinds before releasing, `Drop` removes the directory synchronously.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::git::SourceFetcher;
use keel_core::sanitize::project_slug;

const COMMIT_PREFIX_LEN: usize = 8;

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);

/// Exclusively owned workspace directory of one run
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    /// Picks a fresh directory under `root`; nothing is created on disk yet
    pub fn allocate(root: &Path, repo_name: &str, commit: &str) -> Self {
        let mut repo = project_slug(repo_name);
        if repo.is_empty() {
            repo = "repo".to_string();
        }

        let prefix: String = commit
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(COMMIT_PREFIX_LEN)
            .collect();
        let prefix = if prefix.is_empty() { "head".to_string() } else { prefix };

        let name = format!(
            "{}-{}-{}-{}",
            repo,
            prefix,
            chrono::Utc::now().timestamp_millis(),
            ALLOCATIONS.fetch_add(1, Ordering::Relaxed)
        );

        Self {
            path: root.join(name),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the workspace directory
    pub async fn release(mut self, fetcher: &dyn SourceFetcher) {
        self.released = true;
        match fetcher.cleanup(&self.path).await {
            Ok(()) => debug!("Workspace {} removed", self.path.display()),
            Err(e) => {
                warn!(
                    "Failed to remove workspace {}: {}",
                    self.path.display(),
                    e
                );
                remove_sync(&self.path);
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "Workspace {} dropped without release, removing",
                self.path.display()
            );
            remove_sync(&self.path);
        }
    }
}

fn remove_sync(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove workspace {}: {}", path.display(), e);
        }
    }
}
