//! Workspace isolation manager
//!
//! One isolated branch + directory per (executor, work-item) pair, backed
//! by git worktrees. Item executions never share filesystem state, so a
//! parallel executor model would not collide even though the current
//! coordinator is sequential.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};
use workstore::now_ms;

use super::metadata::{WorkspaceEntry, WorkspaceIndex, WorkspaceState};
use super::proc::GitRunner;

/// Error types for workspace operations
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Workspace already exists for item: {0}")]
    AlreadyExists(String),

    #[error("No workspace for item: {0}")]
    NotFound(String),

    #[error("Workspace directory missing for item: {0}")]
    Missing(String),

    #[error("Workspace for {0} has uncommitted changes; retry with force to remove anyway")]
    UncommittedChanges(String),

    #[error("git {args} failed: {stderr}")]
    GitCommand { args: String, stderr: String },

    #[error("git {args} timed out after {timeout:?}")]
    GitTimeout { args: String, timeout: Duration },

    #[error("Failed to spawn git: {0}")]
    Spawn(String),

    #[error("Review request failed: {0}")]
    Review(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Configuration for the workspace manager
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Path to the main repository
    pub repo_root: PathBuf,

    /// Isolation root holding all workspace checkouts; relative paths are
    /// resolved against `repo_root`
    pub root_dir: PathBuf,

    /// Branch new workspaces fork from
    pub trunk: String,

    /// Remote used by push-and-request-review
    pub remote: String,

    /// Wall-clock bound on every VCS subprocess
    pub timeout: Duration,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            root_dir: PathBuf::from(".sprintd/workspaces"),
            trunk: "main".to_string(),
            remote: "origin".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl WorkspaceConfig {
    fn isolation_root(&self) -> PathBuf {
        if self.root_dir.is_absolute() {
            self.root_dir.clone()
        } else {
            self.repo_root.join(&self.root_dir)
        }
    }
}

/// Live status report for one workspace
#[derive(Debug, Clone)]
pub struct WorkspaceStatus {
    pub item_id: String,
    pub state: WorkspaceState,
    /// Currently checked-out branch; None when the directory is missing
    pub branch: Option<String>,
    /// Uncommitted changes present
    pub dirty: bool,
    /// Commits on the workspace branch but not on trunk
    pub ahead: u32,
    /// Commits on trunk but not on the workspace branch
    pub behind: u32,
}

/// Result of push-and-request-review
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    /// Reference to the created review request, when the tool was available
    pub review_ref: Option<String>,
    pub message: String,
}

/// One raw block from `git worktree list --porcelain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeRecord {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
}

/// Parse the key/value blocks of `git worktree list --porcelain`
pub(crate) fn parse_worktree_list(stdout: &str) -> Vec<WorktreeRecord> {
    let mut records = Vec::new();
    let mut current: Option<WorktreeRecord> = None;

    for line in stdout.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(record) = current.take() {
                records.push(record);
            }
            current = Some(WorktreeRecord {
                path: PathBuf::from(path),
                head: String::new(),
                branch: None,
            });
        } else if let Some(record) = current.as_mut() {
            if let Some(head) = line.strip_prefix("HEAD ") {
                record.head = head.to_string();
            } else if let Some(branch) = line.strip_prefix("branch ") {
                record.branch = Some(branch.trim_start_matches("refs/heads/").to_string());
            }
        }
    }
    if let Some(record) = current.take() {
        records.push(record);
    }
    records
}

/// Manager for isolated work-item workspaces
pub struct WorkspaceManager {
    config: WorkspaceConfig,
    git: GitRunner,
    index: WorkspaceIndex,
}

impl WorkspaceManager {
    pub fn new(config: WorkspaceConfig) -> Self {
        let git = GitRunner::new(&config.repo_root, config.timeout);
        let index = WorkspaceIndex::new(config.isolation_root().join("workspaces.json"));
        Self { config, git, index }
    }

    /// The metadata index backing this manager
    pub fn index(&self) -> &WorkspaceIndex {
        &self.index
    }

    /// Ensure the isolation root exists and is excluded from version control
    pub async fn initialize(&self) -> Result<(), WorkspaceError> {
        let root = self.config.isolation_root();
        fs::create_dir_all(&root)?;

        // Keep workspace checkouts out of the main repository's status
        let info_dir = self.config.repo_root.join(".git").join("info");
        if self.config.repo_root.join(".git").is_dir() {
            if let Ok(rel) = root.strip_prefix(&self.config.repo_root) {
                fs::create_dir_all(&info_dir)?;
                let exclude_path = info_dir.join("exclude");
                let line = format!("/{}/", rel.display());
                let existing = fs::read_to_string(&exclude_path).unwrap_or_default();
                if !existing.lines().any(|l| l.trim() == line) {
                    let mut updated = existing;
                    if !updated.is_empty() && !updated.ends_with('\n') {
                        updated.push('\n');
                    }
                    updated.push_str(&line);
                    updated.push('\n');
                    fs::write(&exclude_path, updated)?;
                }
            }
        }

        debug!(root = %root.display(), "Workspace isolation root ready");
        Ok(())
    }

    /// Create a workspace for an item: a fresh branch off trunk checked
    /// out into `<root>/<executor>-<item-id>`. Fails if the item already
    /// has a workspace, with no side effects beyond the first creation.
    pub async fn create(&self, executor: &str, item_id: &str) -> Result<WorkspaceEntry, WorkspaceError> {
        if self.index.get(item_id)?.is_some() {
            return Err(WorkspaceError::AlreadyExists(item_id.to_string()));
        }

        self.initialize().await?;

        let branch = format!("{}/{}", executor, item_id);
        let path = self.config.isolation_root().join(format!("{}-{}", executor, item_id));
        let path_arg = path.to_string_lossy().to_string();

        self.git
            .expect(&["worktree", "add", &path_arg, "-b", &branch, &self.config.trunk])
            .await?;

        let entry = WorkspaceEntry {
            item_id: item_id.to_string(),
            executor: executor.to_string(),
            branch,
            path,
            created_at: now_ms(),
            status: WorkspaceState::Active,
            review_ref: None,
        };

        let stored = entry.clone();
        self.index.update(move |map| {
            map.insert(stored.item_id.clone(), stored);
            Ok(())
        })?;

        info!(item = %item_id, executor, branch = %entry.branch, "Workspace created");
        Ok(entry)
    }

    /// Managed workspaces: entries present in both the VCS worktree
    /// listing and the metadata index. Anything known to only one side is
    /// excluded from the view.
    pub async fn list(&self) -> Result<Vec<WorkspaceEntry>, WorkspaceError> {
        let output = self.git.expect(&["worktree", "list", "--porcelain"]).await?;
        let live = parse_worktree_list(&output.stdout);
        let index = self.index.load()?;

        Ok(index
            .into_values()
            .filter(|entry| {
                // The VCS reports canonical paths; tolerate symlinked roots
                let canonical = entry.path.canonicalize().ok();
                live.iter()
                    .any(|record| record.path == entry.path || Some(&record.path) == canonical.as_ref())
            })
            .collect())
    }

    /// Report branch, dirtiness, and ahead/behind counts for a workspace.
    /// A workspace whose directory is gone reports `missing` without
    /// touching the VCS.
    pub async fn status(&self, item_id: &str) -> Result<WorkspaceStatus, WorkspaceError> {
        let entry = self
            .index
            .get(item_id)?
            .ok_or_else(|| WorkspaceError::NotFound(item_id.to_string()))?;

        if !entry.path.exists() {
            return Ok(WorkspaceStatus {
                item_id: entry.item_id,
                state: WorkspaceState::Missing,
                branch: None,
                dirty: false,
                ahead: 0,
                behind: 0,
            });
        }

        let branch = self
            .git
            .expect_in(&entry.path, &["branch", "--show-current"])
            .await?
            .stdout_trimmed()
            .to_string();

        let dirty = !self
            .git
            .expect_in(&entry.path, &["status", "--porcelain"])
            .await?
            .stdout
            .trim()
            .is_empty();

        let range = format!("{}...HEAD", self.config.trunk);
        let counts = self
            .git
            .expect_in(&entry.path, &["rev-list", "--left-right", "--count", &range])
            .await?;
        let (behind, ahead) = parse_ahead_behind(counts.stdout_trimmed());

        Ok(WorkspaceStatus {
            item_id: entry.item_id,
            state: entry.status,
            branch: Some(branch),
            dirty,
            ahead,
            behind,
        })
    }

    /// Remove a workspace. Without `force` the call fails when
    /// uncommitted changes are present and leaves the workspace intact;
    /// with `force` it removes unconditionally, falling back to pruning
    /// stale VCS records and deleting the directory tree when the VCS
    /// removal errors. The metadata entry is deleted either way.
    pub async fn remove(&self, item_id: &str, force: bool) -> Result<(), WorkspaceError> {
        let entry = self
            .index
            .get(item_id)?
            .ok_or_else(|| WorkspaceError::NotFound(item_id.to_string()))?;

        if !force && entry.path.exists() {
            let dirty = !self
                .git
                .expect_in(&entry.path, &["status", "--porcelain"])
                .await?
                .stdout
                .trim()
                .is_empty();
            if dirty {
                return Err(WorkspaceError::UncommittedChanges(item_id.to_string()));
            }
        }

        let path_arg = entry.path.to_string_lossy().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_arg);

        let output = self.git.run(&args).await?;
        if !output.success() {
            // Already gone at the VCS level is not a failure
            if output.stderr.contains("is not a working tree") {
                let _ = self.git.run(&["worktree", "prune"]).await;
            } else if force {
                warn!(item = %item_id, stderr = %output.stderr.trim(), "VCS removal failed; pruning and deleting directly");
                let _ = self.git.run(&["worktree", "prune"]).await;
                if entry.path.exists() {
                    fs::remove_dir_all(&entry.path)?;
                }
            } else {
                return Err(WorkspaceError::GitCommand {
                    args: args.join(" "),
                    stderr: output.stderr.trim().to_string(),
                });
            }
        }

        // Best effort; the branch may be checked out elsewhere or pushed
        let _ = self.git.run(&["branch", "-D", &entry.branch]).await;

        self.index.update(|map| {
            map.remove(item_id);
            Ok(())
        })?;

        info!(item = %item_id, "Workspace removed");
        Ok(())
    }

    /// Maintenance pass: prune stale VCS records, drop metadata entries
    /// whose directory no longer exists, and optionally remove workspaces
    /// whose entries are marked completed. Returns the number of entries
    /// removed from the index.
    pub async fn cleanup(&self, remove_completed: bool) -> Result<usize, WorkspaceError> {
        let _ = self.git.run(&["worktree", "prune"]).await;

        let mut removed = 0;

        if remove_completed {
            let completed: Vec<String> = self
                .index
                .load()?
                .into_values()
                .filter(|e| e.status == WorkspaceState::Completed)
                .map(|e| e.item_id)
                .collect();
            for item_id in completed {
                match self.remove(&item_id, true).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(item = %item_id, error = %e, "Failed to remove completed workspace"),
                }
            }
        }

        removed += self.index.update(|map| {
            let before = map.len();
            map.retain(|_, entry| entry.path.exists());
            Ok(before - map.len())
        })?;

        debug!(removed, "Workspace cleanup finished");
        Ok(removed)
    }

    /// Mark an item's workspace as completed (kept until cleanup)
    pub async fn mark_completed(&self, item_id: &str) -> Result<(), WorkspaceError> {
        self.index.update(|map| {
            let entry = map
                .get_mut(item_id)
                .ok_or_else(|| WorkspaceError::NotFound(item_id.to_string()))?;
            entry.status = WorkspaceState::Completed;
            Ok(())
        })
    }

    /// Push the workspace branch to the shared remote and, when the
    /// review tool is available, open a review request and record its
    /// reference. An absent review tool is non-fatal: the push alone is
    /// reported as success with manual-follow-up guidance.
    pub async fn push_and_request_review(
        &self,
        item_id: &str,
        title: &str,
        body: &str,
    ) -> Result<ReviewOutcome, WorkspaceError> {
        let entry = self
            .index
            .get(item_id)?
            .ok_or_else(|| WorkspaceError::NotFound(item_id.to_string()))?;
        if !entry.path.exists() {
            return Err(WorkspaceError::Missing(item_id.to_string()));
        }

        self.git
            .expect_in(&entry.path, &["push", "-u", &self.config.remote, &entry.branch])
            .await?;
        info!(item = %item_id, branch = %entry.branch, "Branch pushed");

        if !review_tool_available().await {
            return Ok(ReviewOutcome {
                review_ref: None,
                message: format!(
                    "Pushed {}; review tool not found, open a review request for it manually",
                    entry.branch
                ),
            });
        }

        let output = Command::new("gh")
            .args([
                "pr",
                "create",
                "--title",
                title,
                "--body",
                body,
                "--base",
                &self.config.trunk,
                "--head",
                &entry.branch,
            ])
            .current_dir(&entry.path)
            .output()
            .await
            .map_err(|e| WorkspaceError::Review(e.to_string()))?;

        if !output.status.success() {
            return Err(WorkspaceError::Review(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let review_ref = String::from_utf8_lossy(&output.stdout).trim().to_string();
        self.index.update(|map| {
            if let Some(entry) = map.get_mut(item_id) {
                entry.status = WorkspaceState::PrCreated;
                entry.review_ref = Some(review_ref.clone());
            }
            Ok(())
        })?;

        Ok(ReviewOutcome {
            message: format!("Review requested: {}", review_ref),
            review_ref: Some(review_ref),
        })
    }
}

/// Parse `git rev-list --left-right --count trunk...HEAD` output:
/// left = commits only on trunk (behind), right = only on HEAD (ahead)
fn parse_ahead_behind(line: &str) -> (u32, u32) {
    let mut parts = line.split_whitespace();
    let behind = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let ahead = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (behind, ahead)
}

/// Whether the optional review-request tool is on the host
async fn review_tool_available() -> bool {
    match Command::new("gh").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
