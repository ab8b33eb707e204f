//! Executor seam
//!
//! The scheduler decides what runs, in what order, and in which
//! workspace; actually doing the work is delegated through this trait.

use async_trait::async_trait;
use eyre::{Context, Result};
use tokio::process::Command;
use tracing::debug;

use crate::domain::ScheduledItem;
use crate::workspace::WorkspaceEntry;

/// What an executor reports back for one item
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub success: bool,

    /// Test coverage percentage reported for the work
    pub coverage: f64,

    /// Human-readable failure reasons
    pub errors: Vec<String>,
}

impl ExecutionOutcome {
    pub fn success(coverage: f64) -> Self {
        Self {
            success: true,
            coverage,
            errors: Vec::new(),
        }
    }

    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            coverage: 0.0,
            errors,
        }
    }
}

/// External executor capability: run one item inside its workspace
#[async_trait]
pub trait ItemExecutor: Send + Sync {
    async fn execute(&self, item: &ScheduledItem, workspace: &WorkspaceEntry) -> Result<ExecutionOutcome>;
}

/// Thin adapter that runs a configured shell command inside the item's
/// workspace. A zero exit status counts as success with full coverage;
/// measuring real coverage is the command's responsibility.
pub struct CommandExecutor {
    command: String,
}

impl CommandExecutor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl ItemExecutor for CommandExecutor {
    async fn execute(&self, item: &ScheduledItem, workspace: &WorkspaceEntry) -> Result<ExecutionOutcome> {
        debug!(item = %item.id(), command = %self.command, "CommandExecutor: running");

        let output = Command::new("sh")
            .args(["-c", &self.command])
            .env("SPRINTD_ITEM_ID", item.id())
            .env("SPRINTD_ITEM_TITLE", item.title())
            .env("SPRINTD_BRANCH", &workspace.branch)
            .current_dir(&workspace.path)
            .output()
            .await
            .context("Failed to spawn executor command")?;

        if output.status.success() {
            Ok(ExecutionOutcome::success(100.0))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                format!("executor command exited with {}", output.status)
            } else {
                stderr
            };
            Ok(ExecutionOutcome::failure(vec![reason]))
        }
    }
}
