//! Subprocess execution for VCS commands
//!
//! Every git invocation goes through `GitRunner`, which applies a
//! caller-configured timeout and returns a typed `ProcOutput` instead of
//! letting callers scrape raw process state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::manager::WorkspaceError;

/// Typed result of a finished subprocess
#[derive(Debug, Clone)]
pub struct ProcOutput {
    /// Exit code; -1 when the process was killed by a signal
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout with surrounding whitespace removed
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Runs git commands against a repository with a bounded wall-clock time
#[derive(Debug, Clone)]
pub struct GitRunner {
    repo_root: PathBuf,
    timeout: Duration,
}

impl GitRunner {
    pub fn new(repo_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo_root: repo_root.into(),
            timeout,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Run git in the repository root
    pub async fn run(&self, args: &[&str]) -> Result<ProcOutput, WorkspaceError> {
        let repo_root = self.repo_root.clone();
        self.run_in(&repo_root, args).await
    }

    /// Run git in an arbitrary directory (e.g. inside a workspace)
    pub async fn run_in(&self, dir: &Path, args: &[&str]) -> Result<ProcOutput, WorkspaceError> {
        debug!(?dir, ?args, "git: run");
        let future = Command::new("git").args(args).current_dir(dir).output();

        let output = tokio::time::timeout(self.timeout, future)
            .await
            .map_err(|_| WorkspaceError::GitTimeout {
                args: args.join(" "),
                timeout: self.timeout,
            })?
            .map_err(|e| WorkspaceError::Spawn(e.to_string()))?;

        Ok(ProcOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run git in the repository root, failing on a non-zero exit
    pub async fn expect(&self, args: &[&str]) -> Result<ProcOutput, WorkspaceError> {
        let repo_root = self.repo_root.clone();
        self.expect_in(&repo_root, args).await
    }

    /// Run git in a directory, failing on a non-zero exit
    pub async fn expect_in(&self, dir: &Path, args: &[&str]) -> Result<ProcOutput, WorkspaceError> {
        let output = self.run_in(dir, args).await?;
        if !output.success() {
            return Err(WorkspaceError::GitCommand {
                args: args.join(" "),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_captures_output() {
        let dir = tempdir().unwrap();
        let git = GitRunner::new(dir.path(), Duration::from_secs(10));

        let out = git.run(&["--version"]).await.unwrap();
        assert!(out.success());
        assert!(out.stdout_trimmed().starts_with("git version"));
    }

    #[tokio::test]
    async fn test_expect_fails_on_nonzero_exit() {
        let dir = tempdir().unwrap();
        let git = GitRunner::new(dir.path(), Duration::from_secs(10));

        // Not a repository, so rev-parse fails
        let result = git.expect(&["rev-parse", "--git-dir"]).await;
        assert!(matches!(result, Err(WorkspaceError::GitCommand { .. })));
    }
}
