//! Work-item records: Story, Task, Bug
//!
//! All three implement the `Record` trait for persistence. The
//! `ScheduledItem` enum is the uniform view the resolver and the
//! execution coordinator operate on.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use workstore::{Record, now_ms};

use super::id::generate_id;
use super::priority::{Priority, Severity};

/// The point scale stories and bugs may be estimated on. Zero means
/// unestimated; unestimated stories are never admitted into a sprint.
pub const POINT_SCALE: [u32; 7] = [1, 2, 3, 5, 8, 13, 21];

/// Errors from work-item invariants
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("Invalid point estimate {0}: allowed values are 1, 2, 3, 5, 8, 13, 21")]
    InvalidPoints(u32),

    #[error("Invalid percentage {0}: must be within 0..=100")]
    InvalidPercentage(u8),
}

/// Validate a point estimate against the fixed scale
pub fn validate_points(points: u32) -> Result<(), ItemError> {
    if POINT_SCALE.contains(&points) {
        Ok(())
    } else {
        Err(ItemError::InvalidPoints(points))
    }
}

/// Lifecycle status shared by stories, tasks, and bugs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    /// In the pool, not yet scheduled
    #[default]
    Backlog,
    /// Admitted into a sprint, awaiting execution
    Ready,
    /// Being worked on in the active sprint
    InProgress,
    /// Finished
    Done,
    /// Execution failed or dependencies unsatisfied
    Blocked,
}

impl WorkItemStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backlog => write!(f, "backlog"),
            Self::Ready => write!(f, "ready"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

/// A user-facing unit of deliverable work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    /// Unique identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Longer description (optional free text)
    #[serde(default)]
    pub description: String,

    /// Scheduling priority
    pub priority: Priority,

    /// Point estimate on the fixed scale; 0 = unestimated
    pub points: u32,

    /// Current lifecycle status
    pub status: WorkItemStatus,

    /// Ids this story depends on
    pub deps: Vec<String>,

    /// Executor assigned to this story, if any
    pub assignee: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Story {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let now = now_ms();
        Self {
            id: generate_id("story", &title),
            title,
            description: String::new(),
            priority: Priority::default(),
            points: 0,
            status: WorkItemStatus::Backlog,
            deps: Vec::new(),
            assignee: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the point estimate; rejects values off the fixed scale
    pub fn estimate(&mut self, points: u32) -> Result<(), ItemError> {
        validate_points(points)?;
        self.points = points;
        self.updated_at = now_ms();
        Ok(())
    }

    pub fn is_estimated(&self) -> bool {
        self.points > 0
    }

    pub fn set_status(&mut self, status: WorkItemStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }

    pub fn add_dependency(&mut self, dep_id: impl Into<String>) {
        self.deps.push(dep_id.into());
        self.updated_at = now_ms();
    }
}

impl Record for Story {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "stories"
    }
}

/// An implementation step under a parent story. Tasks carry no point
/// estimate; their effort is reflected in the parent story's points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,

    /// Parent story id
    pub story_id: String,

    /// Human-readable title
    pub title: String,

    /// Current lifecycle status
    pub status: WorkItemStatus,

    /// Ids this task depends on
    pub deps: Vec<String>,

    /// Executor assigned to this task, if any
    pub assignee: Option<String>,

    /// Completion percentage (0..=100)
    pub completion: u8,

    /// Test coverage percentage (0..=100)
    pub coverage: u8,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Task {
    pub fn new(story_id: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        let now = now_ms();
        Self {
            id: generate_id("task", &title),
            story_id: story_id.into(),
            title,
            status: WorkItemStatus::Backlog,
            deps: Vec::new(),
            assignee: None,
            completion: 0,
            coverage: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record progress. A task is Done only when completion and coverage
    /// both reach 100.
    pub fn set_progress(&mut self, completion: u8, coverage: u8) -> Result<(), ItemError> {
        if completion > 100 {
            return Err(ItemError::InvalidPercentage(completion));
        }
        if coverage > 100 {
            return Err(ItemError::InvalidPercentage(coverage));
        }
        self.completion = completion;
        self.coverage = coverage;
        if completion == 100 && coverage == 100 {
            self.status = WorkItemStatus::Done;
        }
        self.updated_at = now_ms();
        Ok(())
    }

    /// Reset progress when a task re-enters the backlog
    pub fn reset_progress(&mut self) {
        self.completion = 0;
        self.coverage = 0;
        self.updated_at = now_ms();
    }

    pub fn set_status(&mut self, status: WorkItemStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }

    pub fn add_dependency(&mut self, dep_id: impl Into<String>) {
        self.deps.push(dep_id.into());
        self.updated_at = now_ms();
    }
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "tasks"
    }
}

/// A defect report. Critical-severity bugs jump the planning queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bug {
    /// Unique identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Defect severity
    pub severity: Severity,

    /// Scheduling priority
    pub priority: Priority,

    /// Point estimate on the fixed scale; 0 = unestimated
    pub points: u32,

    /// Current lifecycle status
    pub status: WorkItemStatus,

    /// Ids this bug depends on
    pub deps: Vec<String>,

    /// Executor assigned to this bug, if any
    pub assignee: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Bug {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let now = now_ms();
        Self {
            id: generate_id("bug", &title),
            title,
            severity: Severity::default(),
            priority: Priority::default(),
            points: 0,
            status: WorkItemStatus::Backlog,
            deps: Vec::new(),
            assignee: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the point estimate; rejects values off the fixed scale
    pub fn estimate(&mut self, points: u32) -> Result<(), ItemError> {
        validate_points(points)?;
        self.points = points;
        self.updated_at = now_ms();
        Ok(())
    }

    pub fn set_status(&mut self, status: WorkItemStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }

    pub fn add_dependency(&mut self, dep_id: impl Into<String>) {
        self.deps.push(dep_id.into());
        self.updated_at = now_ms();
    }
}

impl Record for Bug {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "bugs"
    }
}

/// Work-item kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Story,
    Task,
    Bug,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Story => write!(f, "story"),
            Self::Task => write!(f, "task"),
            Self::Bug => write!(f, "bug"),
        }
    }
}

/// Uniform view over the three work-item kinds, used by the dependency
/// resolver and the execution coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScheduledItem {
    Story(Story),
    Task(Task),
    Bug(Bug),
}

impl ScheduledItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Story(s) => &s.id,
            Self::Task(t) => &t.id,
            Self::Bug(b) => &b.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Story(s) => &s.title,
            Self::Task(t) => &t.title,
            Self::Bug(b) => &b.title,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Story(_) => ItemKind::Story,
            Self::Task(_) => ItemKind::Task,
            Self::Bug(_) => ItemKind::Bug,
        }
    }

    pub fn deps(&self) -> &[String] {
        match self {
            Self::Story(s) => &s.deps,
            Self::Task(t) => &t.deps,
            Self::Bug(b) => &b.deps,
        }
    }

    /// Points counted toward sprint commitment; tasks contribute none
    pub fn points(&self) -> u32 {
        match self {
            Self::Story(s) => s.points,
            Self::Task(_) => 0,
            Self::Bug(b) => b.points,
        }
    }

    pub fn status(&self) -> WorkItemStatus {
        match self {
            Self::Story(s) => s.status,
            Self::Task(t) => t.status,
            Self::Bug(b) => b.status,
        }
    }

    pub fn assignee(&self) -> Option<&str> {
        match self {
            Self::Story(s) => s.assignee.as_deref(),
            Self::Task(t) => t.assignee.as_deref(),
            Self::Bug(b) => b.assignee.as_deref(),
        }
    }

    pub fn set_status(&mut self, status: WorkItemStatus) {
        match self {
            Self::Story(s) => s.set_status(status),
            Self::Task(t) => t.set_status(status),
            Self::Bug(b) => b.set_status(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_estimate_rejects_off_scale() {
        let mut story = Story::new("Checkout flow");
        assert_eq!(story.estimate(4), Err(ItemError::InvalidPoints(4)));
        assert!(!story.is_estimated());

        story.estimate(8).unwrap();
        assert!(story.is_estimated());
        assert_eq!(story.points, 8);
    }

    #[test]
    fn test_point_scale_is_fibonacci() {
        for points in [1, 2, 3, 5, 8, 13, 21] {
            assert!(validate_points(points).is_ok());
        }
        for points in [0, 4, 6, 7, 9, 20, 22, 100] {
            assert!(validate_points(points).is_err());
        }
    }

    #[test]
    fn test_task_done_requires_full_completion_and_coverage() {
        let mut task = Task::new("story-1", "Wire up API");

        task.set_progress(100, 80).unwrap();
        assert_ne!(task.status, WorkItemStatus::Done);

        task.set_progress(80, 100).unwrap();
        assert_ne!(task.status, WorkItemStatus::Done);

        task.set_progress(100, 100).unwrap();
        assert_eq!(task.status, WorkItemStatus::Done);
    }

    #[test]
    fn test_task_progress_rejects_over_100() {
        let mut task = Task::new("story-1", "Wire up API");
        assert!(task.set_progress(101, 0).is_err());
        assert!(task.set_progress(0, 150).is_err());
    }

    #[test]
    fn test_bug_builders() {
        let bug = Bug::new("Login broken")
            .with_severity(Severity::Critical)
            .with_priority(Priority::High);
        assert!(bug.severity.is_critical());
        assert_eq!(bug.priority, Priority::High);
        assert_eq!(bug.status, WorkItemStatus::Backlog);
    }

    #[test]
    fn test_scheduled_item_accessors() {
        let mut story = Story::new("Checkout flow");
        story.estimate(5).unwrap();
        story.add_dependency("bug-1");

        let mut item = ScheduledItem::Story(story);
        assert_eq!(item.kind(), ItemKind::Story);
        assert_eq!(item.points(), 5);
        assert_eq!(item.deps(), &["bug-1".to_string()]);

        item.set_status(WorkItemStatus::InProgress);
        assert_eq!(item.status(), WorkItemStatus::InProgress);

        let task = ScheduledItem::Task(Task::new("s", "step"));
        assert_eq!(task.points(), 0);
    }

    #[test]
    fn test_work_item_status_serde() {
        let json = serde_json::to_string(&WorkItemStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
