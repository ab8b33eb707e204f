//! Greedy capacity-constrained admission

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Bug, Sprint, SprintStatus, Story, Task, WorkItemStatus};
use workstore::{Store, StoreError};

/// Errors from sprint planning
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Sprint not found: {0}")]
    SprintNotFound(String),

    #[error("Sprint {id} is {status}; planning requires a sprint in planning")]
    NotPlanning { id: String, status: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of planning a sprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SprintPlan {
    pub story_ids: Vec<String>,
    pub task_ids: Vec<String>,
    pub bug_ids: Vec<String>,
    pub committed_points: u32,
}

/// Selects backlog items into a sprint under the velocity cap
pub struct CapacityPlanner<'a> {
    store: &'a Store,
}

impl<'a> CapacityPlanner<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Plan a sprint: admit backlog items under the velocity cap, move
    /// them to Ready, and persist the sprint's item lists and commitment.
    ///
    /// Admission order:
    /// 1. critical-severity bugs, by (severity, priority)
    /// 2. estimated stories, by (priority, points descending)
    /// 3. every task of an admitted story (free of point cost)
    /// 4. remaining non-critical bugs into leftover capacity
    ///
    /// An item whose points exceed remaining capacity is skipped, not
    /// split; leftover capacity is accepted.
    pub fn plan_sprint(&self, sprint_id: &str) -> Result<SprintPlan, PlanError> {
        let mut sprint: Sprint = self
            .store
            .get(sprint_id)?
            .ok_or_else(|| PlanError::SprintNotFound(sprint_id.to_string()))?;

        if sprint.status != SprintStatus::Planning {
            return Err(PlanError::NotPlanning {
                id: sprint.id,
                status: sprint.status.to_string(),
            });
        }

        let velocity = sprint.velocity;
        let backlog = |status: WorkItemStatus| status == WorkItemStatus::Backlog;

        let stories: Vec<Story> = self.store.list()?.into_iter().filter(|s: &Story| backlog(s.status)).collect();
        let tasks: Vec<Task> = self.store.list()?.into_iter().filter(|t: &Task| backlog(t.status)).collect();
        let bugs: Vec<Bug> = self.store.list()?.into_iter().filter(|b: &Bug| backlog(b.status)).collect();

        let mut plan = SprintPlan {
            story_ids: Vec::new(),
            task_ids: Vec::new(),
            bug_ids: Vec::new(),
            committed_points: 0,
        };

        let (mut critical, mut remaining): (Vec<Bug>, Vec<Bug>) =
            bugs.into_iter().partition(|b| b.severity.is_critical());

        // 1. Critical bugs jump the queue
        critical.sort_by_key(|b| (b.severity.rank(), b.priority.rank()));
        for bug in &critical {
            if plan.committed_points + bug.points <= velocity {
                plan.committed_points += bug.points;
                plan.bug_ids.push(bug.id.clone());
            } else {
                debug!(bug = %bug.id, points = bug.points, "Skipping bug: exceeds remaining capacity");
            }
        }

        // 2. Estimated stories by urgency, biggest first within a priority
        let mut estimated: Vec<&Story> = stories.iter().filter(|s| s.is_estimated()).collect();
        estimated.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then(b.points.cmp(&a.points))
        });
        for story in estimated {
            if plan.committed_points + story.points <= velocity {
                plan.committed_points += story.points;
                plan.story_ids.push(story.id.clone());
            } else {
                debug!(story = %story.id, points = story.points, "Skipping story: exceeds remaining capacity");
            }
        }

        // 3. Tasks ride along with their admitted parent story
        for task in &tasks {
            if plan.story_ids.contains(&task.story_id) {
                plan.task_ids.push(task.id.clone());
            }
        }

        // 4. Non-critical bugs fill whatever is left
        remaining.sort_by_key(|b| (b.severity.rank(), b.priority.rank()));
        for bug in &remaining {
            if plan.committed_points + bug.points <= velocity {
                plan.committed_points += bug.points;
                plan.bug_ids.push(bug.id.clone());
            }
        }

        self.persist(&mut sprint, &plan)?;

        info!(
            sprint = %sprint.id,
            stories = plan.story_ids.len(),
            tasks = plan.task_ids.len(),
            bugs = plan.bug_ids.len(),
            committed = plan.committed_points,
            velocity,
            "Sprint planned"
        );

        Ok(plan)
    }

    /// Move admitted items to Ready and write the sprint back
    fn persist(&self, sprint: &mut Sprint, plan: &SprintPlan) -> Result<(), PlanError> {
        for id in &plan.story_ids {
            if let Some(mut story) = self.store.get::<Story>(id)? {
                story.set_status(WorkItemStatus::Ready);
                self.store.update(story)?;
            }
        }
        for id in &plan.task_ids {
            if let Some(mut task) = self.store.get::<Task>(id)? {
                task.set_status(WorkItemStatus::Ready);
                self.store.update(task)?;
            }
        }
        for id in &plan.bug_ids {
            if let Some(mut bug) = self.store.get::<Bug>(id)? {
                bug.set_status(WorkItemStatus::Ready);
                self.store.update(bug)?;
            }
        }

        sprint.story_ids = plan.story_ids.clone();
        sprint.task_ids = plan.task_ids.clone();
        sprint.bug_ids = plan.bug_ids.clone();
        sprint.committed_points = plan.committed_points;
        self.store.update(sprint.clone())?;
        Ok(())
    }
}
