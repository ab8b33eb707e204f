//! Sprint record and lifecycle status
//!
//! A sprint is a time-boxed iteration with a point capacity (velocity).
//! Exactly one sprint may be Active per scheduler session; the state
//! machine lives in `crate::lifecycle`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use workstore::{Record, now_ms};

use super::id::generate_id;

/// Sprint lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    /// Being planned; items may still be admitted
    #[default]
    Planning,
    /// Running; work is in progress
    Active,
    /// Finished via the Complete transition
    Completed,
    /// Abandoned
    Cancelled,
}

impl std::fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planning => write!(f, "planning"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One day's remaining-points snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurndownPoint {
    pub day: NaiveDate,
    pub remaining_points: u32,
}

/// A time-boxed scheduling iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    /// Unique identifier
    pub id: String,

    /// Sprint name
    pub name: String,

    /// Sprint goal statement
    #[serde(default)]
    pub goal: String,

    /// Point capacity ceiling
    pub velocity: u32,

    /// Sum of admitted story/bug points; never exceeds velocity
    pub committed_points: u32,

    /// Sum of points of items finished during the sprint
    pub completed_points: u32,

    /// Admitted story ids, in admission order
    pub story_ids: Vec<String>,

    /// Admitted task ids (children of admitted stories)
    pub task_ids: Vec<String>,

    /// Admitted bug ids, in admission order
    pub bug_ids: Vec<String>,

    /// Current lifecycle status
    pub status: SprintStatus,

    /// Start timestamp (Unix milliseconds), set by the Start transition
    pub started_at: Option<i64>,

    /// End timestamp (Unix milliseconds), set by Complete/Cancel
    pub ended_at: Option<i64>,

    /// Retrospective notes recorded on completion
    pub retrospective: Option<String>,

    /// Daily remaining-points snapshots
    pub burndown: Vec<BurndownPoint>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Sprint {
    pub fn new(name: impl Into<String>, goal: impl Into<String>, velocity: u32) -> Self {
        let name = name.into();
        let now = now_ms();
        Self {
            id: generate_id("sprint", &name),
            name,
            goal: goal.into(),
            velocity,
            committed_points: 0,
            completed_points: 0,
            story_ids: Vec::new(),
            task_ids: Vec::new(),
            bug_ids: Vec::new(),
            status: SprintStatus::Planning,
            started_at: None,
            ended_at: None,
            retrospective: None,
            burndown: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SprintStatus::Active
    }

    /// All admitted item ids: stories, then tasks, then bugs
    pub fn item_ids(&self) -> impl Iterator<Item = &str> {
        self.story_ids
            .iter()
            .chain(self.task_ids.iter())
            .chain(self.bug_ids.iter())
            .map(|id| id.as_str())
    }

    /// Points still open against the commitment
    pub fn remaining_points(&self) -> u32 {
        self.committed_points.saturating_sub(self.completed_points)
    }

    /// Record a burndown snapshot; at most one per day, latest wins
    pub fn record_burndown(&mut self, day: NaiveDate, remaining_points: u32) {
        if let Some(point) = self.burndown.iter_mut().find(|p| p.day == day) {
            point.remaining_points = remaining_points;
        } else {
            self.burndown.push(BurndownPoint { day, remaining_points });
        }
        self.updated_at = now_ms();
    }

    pub fn set_status(&mut self, status: SprintStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }
}

impl Record for Sprint {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "sprints"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sprint_is_planning() {
        let sprint = Sprint::new("Sprint 1", "Ship checkout", 20);
        assert_eq!(sprint.status, SprintStatus::Planning);
        assert_eq!(sprint.velocity, 20);
        assert_eq!(sprint.committed_points, 0);
        assert!(sprint.started_at.is_none());
    }

    #[test]
    fn test_item_ids_order() {
        let mut sprint = Sprint::new("Sprint 1", "", 20);
        sprint.story_ids = vec!["s-1".into()];
        sprint.task_ids = vec!["t-1".into(), "t-2".into()];
        sprint.bug_ids = vec!["b-1".into()];

        let ids: Vec<&str> = sprint.item_ids().collect();
        assert_eq!(ids, vec!["s-1", "t-1", "t-2", "b-1"]);
    }

    #[test]
    fn test_burndown_one_snapshot_per_day() {
        let mut sprint = Sprint::new("Sprint 1", "", 20);
        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        sprint.record_burndown(day, 20);
        sprint.record_burndown(day, 15);
        assert_eq!(sprint.burndown.len(), 1);
        assert_eq!(sprint.burndown[0].remaining_points, 15);

        let next = day.succ_opt().unwrap();
        sprint.record_burndown(next, 12);
        assert_eq!(sprint.burndown.len(), 2);
    }

    #[test]
    fn test_remaining_points_saturates() {
        let mut sprint = Sprint::new("Sprint 1", "", 20);
        sprint.committed_points = 13;
        sprint.completed_points = 5;
        assert_eq!(sprint.remaining_points(), 8);

        sprint.completed_points = 20;
        assert_eq!(sprint.remaining_points(), 0);
    }
}
