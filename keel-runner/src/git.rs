//! Source fetching
//!
//! Checks out a repository at a given commit into a run's workspace using
//! the git CLI. Specific historical commits are supported so a rollback can
//! fetch the last known-good revision.

use async_trait::async_trait;
use keel_core::sanitize::{is_branch_name, is_commit_hash};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Checks out `commit` (or the tip of `branch` when `commit` is empty) into `dest`
    async fn fetch(
        &self,
        repo_url: &str,
        branch: &str,
        dest: &Path,
        token: Option<&str>,
        commit: &str,
    ) -> Result<()>;

    /// Commit hash currently at the tip of `branch`
    async fn resolve_head(&self, repo_url: &str, branch: &str, token: Option<&str>)
    -> Result<String>;

    /// Removes a checkout; removing a missing directory succeeds
    async fn cleanup(&self, path: &Path) -> Result<()>;
}

/// [`SourceFetcher`] backed by the git CLI
#[derive(Debug, Clone)]
pub struct GitFetcher {
    bin: String,
}

impl GitFetcher {
    pub fn new() -> Self {
        Self {
            bin: "git".to_string(),
        }
    }

    /// Runs a git subcommand, returning stdout
    ///
    /// Error messages are redacted of `token`.
    async fn git(&self, dir: Option<&Path>, args: &[&str], token: Option<&str>) -> Result<String> {
        debug!("Running git {}", args.first().unwrap_or(&""));

        let mut command = Command::new(&self.bin);
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        if let Some(dir) = dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|e| {
            EngineError::Fetch(format!("Failed to execute {}: {}", self.bin, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Fetch(redact(
                &format!(
                    "git {} failed: {}",
                    args.first().unwrap_or(&""),
                    stderr.trim()
                ),
                token,
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(
        &self,
        repo_url: &str,
        branch: &str,
        dest: &Path,
        token: Option<&str>,
        commit: &str,
    ) -> Result<()> {
        check_branch(branch)?;
        if !commit.is_empty() && !is_commit_hash(commit) {
            return Err(EngineError::Fetch(format!("Invalid commit hash '{}'", commit)));
        }

        info!("Fetching {}@{} into {}", branch, commit, dest.display());

        tokio::fs::create_dir_all(dest).await?;
        let url = inject_token(repo_url, token);

        self.git(Some(dest), &["init", "--quiet"], token).await?;
        self.git(
            Some(dest),
            &["remote", "add", "--end-of-options", "origin", &url],
            token,
        )
        .await?;

        if commit.is_empty() {
            self.git(
                Some(dest),
                &["fetch", "--depth", "1", "--end-of-options", "origin", branch],
                token,
            )
            .await?;
            self.git(Some(dest), &["checkout", "--detach", "FETCH_HEAD"], token)
                .await?;
            return Ok(());
        }

        match self
            .git(
                Some(dest),
                &["fetch", "--depth", "1", "--end-of-options", "origin", commit],
                token,
            )
            .await
        {
            Ok(_) => {
                self.git(Some(dest), &["checkout", "--detach", "FETCH_HEAD"], token)
                    .await?;
            }
            Err(e) => {
                // Some servers refuse fetching unadvertised commits
                warn!("Shallow fetch of {} refused ({}), fetching {}", commit, e, branch);
                self.git(
                    Some(dest),
                    &["fetch", "--end-of-options", "origin", branch],
                    token,
                )
                .await?;
                self.git(
                    Some(dest),
                    &["checkout", "--detach", "--end-of-options", commit],
                    token,
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn resolve_head(
        &self,
        repo_url: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<String> {
        check_branch(branch)?;

        let url = inject_token(repo_url, token);
        let reference = format!("refs/heads/{}", branch);
        let stdout = self
            .git(None, &["ls-remote", "--end-of-options", &url, &reference], token)
            .await?;

        let head = stdout
            .split_whitespace()
            .next()
            .ok_or_else(|| EngineError::Fetch(format!("Branch {} not found", branch)))?;
        if !is_commit_hash(head) {
            return Err(EngineError::Fetch(format!(
                "Unexpected ls-remote output for {}: {}",
                branch, head
            )));
        }
        Ok(head.to_string())
    }

    async fn cleanup(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn check_branch(branch: &str) -> Result<()> {
    if is_branch_name(branch) {
        Ok(())
    } else {
        Err(EngineError::Fetch(format!("Invalid branch name '{}'", branch)))
    }
}

/// Adds the token to HTTPS URLs for authentication
///
/// `https://host/user/repo.git` becomes `https://TOKEN@host/user/repo.git`.
fn inject_token(repo_url: &str, token: Option<&str>) -> String {
    match (token, repo_url.strip_prefix("https://")) {
        (Some(token), Some(rest)) if !token.is_empty() => format!("https://{}@{}", token, rest),
        _ => repo_url.to_string(),
    }
}

fn redact(message: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if !token.is_empty() => message.replace(token, "***"),
        _ => message.to_string(),
    }
}
