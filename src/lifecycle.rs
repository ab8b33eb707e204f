//! Sprint state machine
//!
//! `Planning -> Active -> {Completed, Cancelled}`. At most one sprint is
//! Active per `SchedulerSession`; the session owns the current-sprint
//! reference explicitly instead of hiding it in process-wide state, so
//! independent schedulers (and tests) cannot interfere.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{Bug, Sprint, SprintStatus, Story, Task, WorkItemStatus};
use workstore::{Store, StoreError, now_ms};

/// Errors from sprint transitions
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Sprint not found: {0}")]
    SprintNotFound(String),

    #[error("Another sprint is already active: {0}")]
    AlreadyActive(String),

    #[error("Sprint has no committed work")]
    NoCommittedWork,

    #[error("Invalid sprint state: expected {expected}, found {found}")]
    InvalidState { expected: String, found: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Owns the single-active-sprint invariant for one scheduler instance
#[derive(Debug, Default, Clone)]
pub struct SchedulerSession {
    current_sprint_id: Option<String>,
}

impl SchedulerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session from persisted state: the Active sprint, if any,
    /// becomes the session's current sprint. Lets a fresh process resume
    /// where the previous invocation left off.
    pub fn restore(store: &Store) -> Result<Self, StoreError> {
        let active = store
            .list::<Sprint>()?
            .into_iter()
            .find(|s| s.status == SprintStatus::Active);
        Ok(Self {
            current_sprint_id: active.map(|s| s.id),
        })
    }

    /// Id of the currently active sprint, if any
    pub fn current_sprint(&self) -> Option<&str> {
        self.current_sprint_id.as_deref()
    }

    fn set_current(&mut self, sprint_id: impl Into<String>) {
        self.current_sprint_id = Some(sprint_id.into());
    }

    fn clear_current(&mut self, sprint_id: &str) {
        if self.current_sprint_id.as_deref() == Some(sprint_id) {
            self.current_sprint_id = None;
        }
    }
}

/// Drives sprint transitions against the store
pub struct SprintLifecycle<'a> {
    store: &'a Store,
}

impl<'a> SprintLifecycle<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Start a sprint: fails if the session already has an active sprint
    /// or the sprint has no committed work. Cascades InProgress to every
    /// admitted item and records the opening burndown snapshot.
    pub fn start(&self, session: &mut SchedulerSession, sprint_id: &str) -> Result<Sprint, LifecycleError> {
        if let Some(active) = session.current_sprint() {
            return Err(LifecycleError::AlreadyActive(active.to_string()));
        }

        let mut sprint = self.load(sprint_id)?;
        if sprint.status != SprintStatus::Planning {
            return Err(LifecycleError::InvalidState {
                expected: SprintStatus::Planning.to_string(),
                found: sprint.status.to_string(),
            });
        }
        if sprint.committed_points == 0 {
            return Err(LifecycleError::NoCommittedWork);
        }

        self.cascade_status(&sprint, WorkItemStatus::InProgress)?;

        sprint.set_status(SprintStatus::Active);
        sprint.started_at = Some(now_ms());
        sprint.record_burndown(Utc::now().date_naive(), sprint.committed_points);
        self.store.update(sprint.clone())?;

        session.set_current(&sprint.id);
        info!(sprint = %sprint.id, committed = sprint.committed_points, "Sprint started");
        Ok(sprint)
    }

    /// Complete an active sprint: records end time and retrospective
    /// notes, tallies completed points, and reverts every non-Done item
    /// to Backlog - no partial carry-over. Clears the session reference.
    pub fn complete(
        &self,
        session: &mut SchedulerSession,
        sprint_id: &str,
        notes: Option<String>,
    ) -> Result<Sprint, LifecycleError> {
        let mut sprint = self.load(sprint_id)?;
        if sprint.status != SprintStatus::Active {
            return Err(LifecycleError::InvalidState {
                expected: SprintStatus::Active.to_string(),
                found: sprint.status.to_string(),
            });
        }

        sprint.completed_points = self.tally_completed_points(&sprint)?;
        let reverted = self.revert_unfinished(&sprint)?;
        if reverted > 0 {
            warn!(sprint = %sprint.id, reverted, "Unfinished items returned to backlog");
        }

        sprint.set_status(SprintStatus::Completed);
        sprint.ended_at = Some(now_ms());
        sprint.retrospective = notes;
        sprint.record_burndown(Utc::now().date_naive(), sprint.remaining_points());
        self.store.update(sprint.clone())?;

        session.clear_current(&sprint.id);
        info!(sprint = %sprint.id, completed = sprint.completed_points, "Sprint completed");
        Ok(sprint)
    }

    /// Cancel a sprint from Planning or Active; items revert to Backlog.
    pub fn cancel(&self, session: &mut SchedulerSession, sprint_id: &str) -> Result<Sprint, LifecycleError> {
        let mut sprint = self.load(sprint_id)?;
        match sprint.status {
            SprintStatus::Planning | SprintStatus::Active => {}
            other => {
                return Err(LifecycleError::InvalidState {
                    expected: "planning or active".to_string(),
                    found: other.to_string(),
                });
            }
        }

        self.revert_unfinished(&sprint)?;

        sprint.set_status(SprintStatus::Cancelled);
        sprint.ended_at = Some(now_ms());
        self.store.update(sprint.clone())?;

        session.clear_current(&sprint.id);
        info!(sprint = %sprint.id, "Sprint cancelled");
        Ok(sprint)
    }

    fn load(&self, sprint_id: &str) -> Result<Sprint, LifecycleError> {
        self.store
            .get(sprint_id)?
            .ok_or_else(|| LifecycleError::SprintNotFound(sprint_id.to_string()))
    }

    fn cascade_status(&self, sprint: &Sprint, status: WorkItemStatus) -> Result<(), LifecycleError> {
        for id in &sprint.story_ids {
            if let Some(mut story) = self.store.get::<Story>(id)? {
                story.set_status(status);
                self.store.update(story)?;
            }
        }
        for id in &sprint.task_ids {
            if let Some(mut task) = self.store.get::<Task>(id)? {
                task.set_status(status);
                self.store.update(task)?;
            }
        }
        for id in &sprint.bug_ids {
            if let Some(mut bug) = self.store.get::<Bug>(id)? {
                bug.set_status(status);
                self.store.update(bug)?;
            }
        }
        Ok(())
    }

    fn tally_completed_points(&self, sprint: &Sprint) -> Result<u32, LifecycleError> {
        let mut total = 0;
        for id in &sprint.story_ids {
            if let Some(story) = self.store.get::<Story>(id)? {
                if story.status.is_done() {
                    total += story.points;
                }
            }
        }
        for id in &sprint.bug_ids {
            if let Some(bug) = self.store.get::<Bug>(id)? {
                if bug.status.is_done() {
                    total += bug.points;
                }
            }
        }
        Ok(total)
    }

    /// Send every non-Done item back to Backlog; tasks also lose their
    /// recorded progress.
    fn revert_unfinished(&self, sprint: &Sprint) -> Result<usize, LifecycleError> {
        let mut reverted = 0;
        for id in &sprint.story_ids {
            if let Some(mut story) = self.store.get::<Story>(id)? {
                if !story.status.is_done() {
                    story.set_status(WorkItemStatus::Backlog);
                    self.store.update(story)?;
                    reverted += 1;
                }
            }
        }
        for id in &sprint.task_ids {
            if let Some(mut task) = self.store.get::<Task>(id)? {
                if !task.status.is_done() {
                    task.set_status(WorkItemStatus::Backlog);
                    task.reset_progress();
                    self.store.update(task)?;
                    reverted += 1;
                }
            }
        }
        for id in &sprint.bug_ids {
            if let Some(mut bug) = self.store.get::<Bug>(id)? {
                if !bug.status.is_done() {
                    bug.set_status(WorkItemStatus::Backlog);
                    self.store.update(bug)?;
                    reverted += 1;
                }
            }
        }
        Ok(reverted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;
    use crate::planner::CapacityPlanner;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();
        (temp, store)
    }

    fn planned_sprint(store: &Store, velocity: u32) -> String {
        let mut story = Story::new("Feature").with_priority(Priority::High);
        story.estimate(8).unwrap();
        let story_id = store.insert(story).unwrap();
        store.insert(Task::new(&story_id, "Implement")).unwrap();

        let sprint_id = store.insert(Sprint::new("Sprint", "", velocity)).unwrap();
        CapacityPlanner::new(store).plan_sprint(&sprint_id).unwrap();
        sprint_id
    }

    #[test]
    fn test_start_cascades_in_progress() {
        let (_temp, store) = store();
        let sprint_id = planned_sprint(&store, 20);
        let mut session = SchedulerSession::new();

        let sprint = SprintLifecycle::new(&store).start(&mut session, &sprint_id).unwrap();

        assert_eq!(sprint.status, SprintStatus::Active);
        assert!(sprint.started_at.is_some());
        assert_eq!(session.current_sprint(), Some(sprint_id.as_str()));
        assert_eq!(sprint.burndown.len(), 1);
        assert_eq!(sprint.burndown[0].remaining_points, 8);

        for id in &sprint.story_ids {
            let story: Story = store.get(id).unwrap().unwrap();
            assert_eq!(story.status, WorkItemStatus::InProgress);
        }
        for id in &sprint.task_ids {
            let task: Task = store.get(id).unwrap().unwrap();
            assert_eq!(task.status, WorkItemStatus::InProgress);
        }
    }

    #[test]
    fn test_start_fails_without_committed_work() {
        let (_temp, store) = store();
        let sprint_id = store.insert(Sprint::new("Empty", "", 20)).unwrap();
        let mut session = SchedulerSession::new();

        let result = SprintLifecycle::new(&store).start(&mut session, &sprint_id);
        assert!(matches!(result, Err(LifecycleError::NoCommittedWork)));
        assert!(session.current_sprint().is_none());
    }

    #[test]
    fn test_second_start_fails_and_leaves_first_untouched() {
        let (_temp, store) = store();
        let first = planned_sprint(&store, 20);
        let second = planned_sprint(&store, 20);
        let mut session = SchedulerSession::new();

        let lifecycle = SprintLifecycle::new(&store);
        lifecycle.start(&mut session, &first).unwrap();

        let result = lifecycle.start(&mut session, &second);
        assert!(matches!(result, Err(LifecycleError::AlreadyActive(_))));

        // The first sprint is still the active one
        let sprint: Sprint = store.get(&first).unwrap().unwrap();
        assert_eq!(sprint.status, SprintStatus::Active);
        assert_eq!(session.current_sprint(), Some(first.as_str()));

        let untouched: Sprint = store.get(&second).unwrap().unwrap();
        assert_eq!(untouched.status, SprintStatus::Planning);
    }

    #[test]
    fn test_complete_requires_active() {
        let (_temp, store) = store();
        let sprint_id = store.insert(Sprint::new("Sprint", "", 20)).unwrap();
        let mut session = SchedulerSession::new();

        let result = SprintLifecycle::new(&store).complete(&mut session, &sprint_id, None);
        assert!(matches!(result, Err(LifecycleError::InvalidState { .. })));
    }

    #[test]
    fn test_complete_reverts_unfinished_and_clears_session() {
        let (_temp, store) = store();
        let sprint_id = planned_sprint(&store, 20);
        let mut session = SchedulerSession::new();
        let lifecycle = SprintLifecycle::new(&store);

        lifecycle.start(&mut session, &sprint_id).unwrap();
        let sprint = lifecycle
            .complete(&mut session, &sprint_id, Some("went fine".to_string()))
            .unwrap();

        assert_eq!(sprint.status, SprintStatus::Completed);
        assert!(sprint.ended_at.is_some());
        assert_eq!(sprint.retrospective.as_deref(), Some("went fine"));
        // Nothing finished, so nothing counts
        assert_eq!(sprint.completed_points, 0);
        assert!(session.current_sprint().is_none());

        for id in &sprint.story_ids {
            let story: Story = store.get(id).unwrap().unwrap();
            assert_eq!(story.status, WorkItemStatus::Backlog);
        }
        for id in &sprint.task_ids {
            let task: Task = store.get(id).unwrap().unwrap();
            assert_eq!(task.status, WorkItemStatus::Backlog);
            assert_eq!(task.completion, 0);
        }
    }

    #[test]
    fn test_complete_tallies_done_points() {
        let (_temp, store) = store();
        let sprint_id = planned_sprint(&store, 20);
        let mut session = SchedulerSession::new();
        let lifecycle = SprintLifecycle::new(&store);

        let sprint = lifecycle.start(&mut session, &sprint_id).unwrap();

        // Finish the story by hand
        let story_id = sprint.story_ids[0].clone();
        let mut story: Story = store.get(&story_id).unwrap().unwrap();
        story.set_status(WorkItemStatus::Done);
        store.update(story).unwrap();

        let sprint = lifecycle.complete(&mut session, &sprint_id, None).unwrap();
        assert_eq!(sprint.completed_points, 8);

        let done: Story = store.get(&story_id).unwrap().unwrap();
        assert_eq!(done.status, WorkItemStatus::Done);
    }

    #[test]
    fn test_cancel_from_active() {
        let (_temp, store) = store();
        let sprint_id = planned_sprint(&store, 20);
        let mut session = SchedulerSession::new();
        let lifecycle = SprintLifecycle::new(&store);

        lifecycle.start(&mut session, &sprint_id).unwrap();
        let sprint = lifecycle.cancel(&mut session, &sprint_id).unwrap();

        assert_eq!(sprint.status, SprintStatus::Cancelled);
        assert!(session.current_sprint().is_none());
    }

    #[test]
    fn test_session_restore_finds_active_sprint() {
        let (_temp, store) = store();
        let sprint_id = planned_sprint(&store, 20);
        let mut session = SchedulerSession::new();
        SprintLifecycle::new(&store).start(&mut session, &sprint_id).unwrap();

        // A fresh session sees the persisted active sprint
        let restored = SchedulerSession::restore(&store).unwrap();
        assert_eq!(restored.current_sprint(), Some(sprint_id.as_str()));
    }

    #[test]
    fn test_independent_sessions_do_not_interfere_in_memory() {
        let temp_a = TempDir::new().unwrap();
        let temp_b = TempDir::new().unwrap();
        let store_a = Store::open(temp_a.path()).unwrap();
        let store_b = Store::open(temp_b.path()).unwrap();

        let sprint_a = {
            let mut story = Story::new("A").with_priority(Priority::High);
            story.estimate(5).unwrap();
            store_a.insert(story).unwrap();
            let id = store_a.insert(Sprint::new("A", "", 20)).unwrap();
            CapacityPlanner::new(&store_a).plan_sprint(&id).unwrap();
            id
        };
        let sprint_b = {
            let mut story = Story::new("B").with_priority(Priority::High);
            story.estimate(5).unwrap();
            store_b.insert(story).unwrap();
            let id = store_b.insert(Sprint::new("B", "", 20)).unwrap();
            CapacityPlanner::new(&store_b).plan_sprint(&id).unwrap();
            id
        };

        let mut session_a = SchedulerSession::new();
        let mut session_b = SchedulerSession::new();

        SprintLifecycle::new(&store_a).start(&mut session_a, &sprint_a).unwrap();
        // A second, independent scheduler is unaffected by the first
        SprintLifecycle::new(&store_b).start(&mut session_b, &sprint_b).unwrap();
    }
}
