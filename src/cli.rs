//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::{Priority, Severity};

/// sprintd - capacity-constrained sprint scheduler
#[derive(Parser)]
#[command(
    name = "sprintd",
    about = "Schedules stories, tasks, and bugs into sprints and runs them in isolated workspaces",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Manage the backlog
    Backlog {
        #[command(subcommand)]
        command: BacklogCommand,
    },

    /// Manage sprints
    Sprint {
        #[command(subcommand)]
        command: SprintCommand,
    },

    /// Plan a sprint: admit backlog items under the velocity cap
    Plan {
        /// Sprint id or partial reference
        sprint: String,
    },

    /// Execute an active sprint's items in dependency order
    Run {
        /// Sprint id or partial reference
        sprint: String,
    },

    /// Manage isolated workspaces
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommand,
    },
}

/// Backlog subcommands
#[derive(Subcommand)]
pub enum BacklogCommand {
    /// Add a story
    Story {
        /// Story title
        title: String,

        /// Point estimate (1, 2, 3, 5, 8, 13, 21)
        #[arg(short, long)]
        points: Option<u32>,

        /// Priority
        #[arg(long, default_value = "medium", value_parser = parse_priority)]
        priority: Priority,
    },

    /// Add a task under a story
    Task {
        /// Parent story id or partial reference
        story: String,

        /// Task title
        title: String,
    },

    /// Add a bug
    Bug {
        /// Bug title
        title: String,

        /// Severity
        #[arg(long, default_value = "major", value_parser = parse_severity)]
        severity: Severity,

        /// Priority
        #[arg(long, default_value = "medium", value_parser = parse_priority)]
        priority: Priority,

        /// Point estimate (1, 2, 3, 5, 8, 13, 21)
        #[arg(short, long)]
        points: Option<u32>,
    },

    /// Set the point estimate of a story or bug
    Estimate {
        /// Item id or partial reference
        item: String,

        /// Point estimate (1, 2, 3, 5, 8, 13, 21)
        points: u32,
    },

    /// Add a dependency between two items
    Depend {
        /// Dependent item id or partial reference
        item: String,

        /// Item it depends on
        on: String,
    },

    /// List backlog items
    List,
}

/// Sprint subcommands
#[derive(Subcommand)]
pub enum SprintCommand {
    /// Create a sprint; velocity defaults to recent throughput
    New {
        /// Sprint name
        name: String,

        /// Sprint goal
        #[arg(long, default_value = "")]
        goal: String,

        /// Explicit velocity override
        #[arg(long)]
        velocity: Option<u32>,
    },

    /// Start a planned sprint
    Start {
        /// Sprint id or partial reference
        sprint: String,
    },

    /// Complete the active sprint; unfinished items return to backlog
    Complete {
        /// Sprint id or partial reference
        sprint: String,

        /// Retrospective notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Cancel a sprint
    Cancel {
        /// Sprint id or partial reference
        sprint: String,
    },

    /// Show a sprint: status, commitment, burndown
    Show {
        /// Sprint id or partial reference
        sprint: String,
    },
}

/// Workspace subcommands
#[derive(Subcommand)]
pub enum WorkspaceCommand {
    /// Create the isolation root and exclude it from version control
    Init,

    /// List managed workspaces
    List,

    /// Show branch, dirtiness, and ahead/behind for an item's workspace
    Status {
        /// Work-item id or partial reference
        item: String,
    },

    /// Remove an item's workspace
    Remove {
        /// Work-item id or partial reference
        item: String,

        /// Remove even with uncommitted changes
        #[arg(long)]
        force: bool,
    },

    /// Prune stale records and drop dead metadata entries
    Cleanup {
        /// Also remove workspaces marked completed
        #[arg(long)]
        remove_completed: bool,
    },

    /// Push the workspace branch and open a review request
    Review {
        /// Work-item id or partial reference
        item: String,

        /// Review title; defaults to the item title
        #[arg(long)]
        title: Option<String>,

        /// Review body
        #[arg(long, default_value = "")]
        body: String,
    },
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    s.parse()
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backlog_story() {
        let cli = Cli::parse_from(["sprintd", "backlog", "story", "Checkout flow", "-p", "8", "--priority", "high"]);
        match cli.command {
            Command::Backlog {
                command: BacklogCommand::Story { title, points, priority },
            } => {
                assert_eq!(title, "Checkout flow");
                assert_eq!(points, Some(8));
                assert_eq!(priority, Priority::High);
            }
            _ => panic!("Expected backlog story command"),
        }
    }

    #[test]
    fn test_parse_bug_defaults() {
        let cli = Cli::parse_from(["sprintd", "backlog", "bug", "Login broken"]);
        match cli.command {
            Command::Backlog {
                command: BacklogCommand::Bug { severity, priority, points, .. },
            } => {
                assert_eq!(severity, Severity::Major);
                assert_eq!(priority, Priority::Medium);
                assert!(points.is_none());
            }
            _ => panic!("Expected backlog bug command"),
        }
    }

    #[test]
    fn test_parse_invalid_priority_fails() {
        let result = Cli::try_parse_from(["sprintd", "backlog", "story", "X", "--priority", "urgent"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_sprint_complete_with_notes() {
        let cli = Cli::parse_from(["sprintd", "sprint", "complete", "sprint-1", "--notes", "shipped"]);
        match cli.command {
            Command::Sprint {
                command: SprintCommand::Complete { sprint, notes },
            } => {
                assert_eq!(sprint, "sprint-1");
                assert_eq!(notes.as_deref(), Some("shipped"));
            }
            _ => panic!("Expected sprint complete command"),
        }
    }

    #[test]
    fn test_parse_workspace_remove_force() {
        let cli = Cli::parse_from(["sprintd", "workspace", "remove", "item-1", "--force"]);
        match cli.command {
            Command::Workspace {
                command: WorkspaceCommand::Remove { item, force },
            } => {
                assert_eq!(item, "item-1");
                assert!(force);
            }
            _ => panic!("Expected workspace remove command"),
        }
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["sprintd", "run", "sprint-1"]);
        assert!(matches!(cli.command, Command::Run { .. }));
    }

    #[test]
    fn test_parse_with_config_flag() {
        let cli = Cli::parse_from(["sprintd", "-c", "/path/to/sprintd.yml", "backlog", "list"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/sprintd.yml")));
    }
}
