//! Workspace metadata index
//!
//! A JSON map of work-item id -> workspace entry stored beside the
//! isolation root. All mutations are read-modify-write under an exclusive
//! file lock so concurrent callers cannot lose updates.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::manager::WorkspaceError;

/// State tag on a workspace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceState {
    /// Checked out and usable
    #[default]
    Active,
    /// The on-disk directory is gone
    Missing,
    /// A review request was opened for the branch
    PrCreated,
    /// The item finished; the workspace awaits cleanup
    Completed,
}

impl std::fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Missing => write!(f, "missing"),
            Self::PrCreated => write!(f, "pr_created"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// One isolated workspace: a branch checked out into its own directory
/// for a single (executor, work-item) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    /// Work-item id this workspace belongs to
    pub item_id: String,

    /// Executor the workspace was provisioned for
    pub executor: String,

    /// Branch name: `<executor>/<item-id>`
    pub branch: String,

    /// Checkout directory
    pub path: PathBuf,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Current state tag
    pub status: WorkspaceState,

    /// Reference to the opened review request, if any
    pub review_ref: Option<String>,
}

/// File-locked map of item id -> workspace entry
#[derive(Debug, Clone)]
pub struct WorkspaceIndex {
    path: PathBuf,
}

impl WorkspaceIndex {
    /// `path` is the JSON index file; its lock file sits beside it
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full index
    pub fn load(&self) -> Result<BTreeMap<String, WorkspaceEntry>, WorkspaceError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    /// Fetch one entry by item id
    pub fn get(&self, item_id: &str) -> Result<Option<WorkspaceEntry>, WorkspaceError> {
        Ok(self.load()?.get(item_id).cloned())
    }

    /// Run a read-modify-write on the index under an exclusive file lock
    pub fn update<T, F>(&self, f: F) -> Result<T, WorkspaceError>
    where
        F: FnOnce(&mut BTreeMap<String, WorkspaceEntry>) -> Result<T, WorkspaceError>,
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.path.with_extension("lock"))?;
        lock_file.lock_exclusive()?;

        let result = (|| {
            let mut map = self.load()?;
            let out = f(&mut map)?;
            let tmp = self.path.with_extension("json.tmp");
            fs::write(&tmp, serde_json::to_string_pretty(&map)?)?;
            fs::rename(&tmp, &self.path)?;
            Ok(out)
        })();

        let _ = FileExt::unlock(&lock_file);
        result
    }
}
