//! Configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::workspace::WorkspaceConfig;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persistent store location
    pub storage: StorageConfig,

    /// VCS and workspace isolation settings
    pub git: GitConfig,

    /// Capacity planning settings
    pub planner: PlannerConfig,

    /// Executor adapter settings
    pub executor: ExecutorConfig,
}

impl Config {
    /// Validate configuration before use; fails fast with clear messages
    pub fn validate(&self) -> Result<()> {
        if self.planner.default_velocity == 0 {
            return Err(eyre::eyre!("planner.default-velocity must be greater than zero"));
        }
        if self.planner.velocity_lookback == 0 {
            return Err(eyre::eyre!("planner.velocity-lookback must be greater than zero"));
        }
        if self.git.timeout_secs == 0 {
            return Err(eyre::eyre!("git.timeout-secs must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain:
    /// explicit path, then `.sprintd.yml`, then the user config dir,
    /// then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".sprintd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sprintd").join("sprintd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Persistent store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the record collections
    #[serde(rename = "store-dir")]
    pub store_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(".sprintd/store"),
        }
    }
}

/// VCS and workspace isolation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Branch workspaces fork from
    pub trunk: String,

    /// Remote used when pushing for review
    pub remote: String,

    /// Isolation root for workspace checkouts
    #[serde(rename = "workspace-root")]
    pub workspace_root: PathBuf,

    /// Wall-clock bound on every VCS subprocess, in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            trunk: "main".to_string(),
            remote: "origin".to_string(),
            workspace_root: PathBuf::from(".sprintd/workspaces"),
            timeout_secs: 30,
        }
    }
}

impl GitConfig {
    /// Build the workspace manager configuration for a repository
    pub fn workspace_config(&self, repo_root: impl Into<PathBuf>) -> WorkspaceConfig {
        WorkspaceConfig {
            repo_root: repo_root.into(),
            root_dir: self.workspace_root.clone(),
            trunk: self.trunk.clone(),
            remote: self.remote.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Capacity planning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Velocity used when no completed-sprint history exists
    #[serde(rename = "default-velocity")]
    pub default_velocity: u32,

    /// How many completed sprints feed the velocity average
    #[serde(rename = "velocity-lookback")]
    pub velocity_lookback: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_velocity: 20,
            velocity_lookback: 3,
        }
    }
}

/// Executor adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Executor name used for unassigned items (branch/workspace naming)
    pub name: String,

    /// Shell command the CommandExecutor runs per item; `sprintd run`
    /// requires it
    pub command: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            command: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.planner.default_velocity, 20);
        assert_eq!(config.planner.velocity_lookback, 3);
        assert_eq!(config.git.trunk, "main");
        assert_eq!(config.git.timeout_secs, 30);
        assert_eq!(config.executor.name, "agent");
        assert!(config.executor.command.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_velocity() {
        let mut config = Config::default();
        config.planner.default_velocity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_partial_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sprintd.yml");
        fs::write(
            &path,
            "git:\n  trunk: develop\n  timeout-secs: 5\nplanner:\n  default-velocity: 13\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.git.trunk, "develop");
        assert_eq!(config.git.timeout_secs, 5);
        assert_eq!(config.planner.default_velocity, 13);
        // Unspecified sections keep their defaults
        assert_eq!(config.executor.name, "agent");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = Config::load(Some(&PathBuf::from("/nonexistent/sprintd.yml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_workspace_config_conversion() {
        let config = Config::default();
        let ws = config.git.workspace_config("/repo");
        assert_eq!(ws.repo_root, PathBuf::from("/repo"));
        assert_eq!(ws.trunk, "main");
        assert_eq!(ws.timeout, Duration::from_secs(30));
    }
}
