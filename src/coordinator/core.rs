//! Sequential, fail-fast sprint execution
//!
//! Drives the resolver's order strictly one item at a time. A
//! dependency-gate failure records a per-item result and moves on; the
//! first real execution failure halts the remaining run.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use eyre::{Result, bail};
use tracing::{debug, info, warn};

use crate::domain::{Bug, ScheduledItem, Sprint, Story, Task, WorkItemStatus};
use crate::resolver;
use crate::workspace::{WorkspaceEntry, WorkspaceError, WorkspaceManager};
use workstore::Store;

use super::executor::{ExecutionOutcome, ItemExecutor};

/// Result recorded for one attempted item
#[derive(Debug, Clone)]
pub struct ItemResult {
    pub item_id: String,
    pub success: bool,
    pub coverage: f64,
    pub errors: Vec<String>,
}

/// Outcome of a sprint run
#[derive(Debug)]
pub struct RunReport {
    pub sprint_id: String,
    pub results: Vec<ItemResult>,

    /// Id of the item whose failure halted the run, if any
    pub halted_on: Option<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// Drives an active sprint's items through the executor
pub struct ExecutionCoordinator<'a> {
    store: &'a Store,
    workspaces: &'a WorkspaceManager,
    executor: Arc<dyn ItemExecutor>,
    default_executor: String,
}

impl<'a> ExecutionCoordinator<'a> {
    pub fn new(
        store: &'a Store,
        workspaces: &'a WorkspaceManager,
        executor: Arc<dyn ItemExecutor>,
        default_executor: impl Into<String>,
    ) -> Self {
        Self {
            store,
            workspaces,
            executor,
            default_executor: default_executor.into(),
        }
    }

    /// Run every admitted item of an active sprint in dependency order.
    ///
    /// Sequential execution, no parallel work: an item starts only after
    /// the previous one finished. The first execution failure (including
    /// a success downgraded for insufficient coverage) halts the run;
    /// unsatisfied dependencies fail the single item and continue.
    pub async fn run_sprint(&self, sprint_id: &str) -> Result<RunReport> {
        let mut sprint: Sprint = match self.store.get(sprint_id)? {
            Some(sprint) => sprint,
            None => bail!("Sprint not found: {}", sprint_id),
        };
        if !sprint.is_active() {
            bail!("Sprint {} is {}; only an active sprint can run", sprint.id, sprint.status);
        }

        let items = self.collect_items(&sprint)?;
        let ordered = resolver::order_items(items)?;
        info!(sprint = %sprint.id, items = ordered.len(), "Running sprint");

        let mut report = RunReport {
            sprint_id: sprint.id.clone(),
            results: Vec::new(),
            halted_on: None,
        };
        let mut succeeded: HashSet<String> = HashSet::new();

        for mut item in ordered {
            let item_id = item.id().to_string();

            let unmet = self.unmet_dependencies(&item, &succeeded)?;
            if !unmet.is_empty() {
                warn!(item = %item_id, ?unmet, "Dependencies not satisfied");
                item.set_status(WorkItemStatus::Blocked);
                self.persist_item(&item)?;
                report.results.push(ItemResult {
                    item_id,
                    success: false,
                    coverage: 0.0,
                    errors: vec![format!("dependencies not satisfied: {}", unmet.join(", "))],
                });
                continue;
            }

            let executor_name = item.assignee().unwrap_or(&self.default_executor).to_string();
            let workspace = match self.provision_workspace(&executor_name, &item_id).await {
                Ok(workspace) => workspace,
                Err(e) => {
                    // Cannot execute without an isolated workspace; halt
                    item.set_status(WorkItemStatus::Blocked);
                    self.persist_item(&item)?;
                    report.results.push(ItemResult {
                        item_id: item_id.clone(),
                        success: false,
                        coverage: 0.0,
                        errors: vec![format!("workspace provisioning failed: {}", e)],
                    });
                    report.halted_on = Some(item_id);
                    break;
                }
            };

            let mut outcome = match self.executor.execute(&item, &workspace).await {
                Ok(outcome) => outcome,
                Err(e) => ExecutionOutcome::failure(vec![e.to_string()]),
            };

            // An executor may claim success while shipping untested work;
            // downgrade anything below full coverage.
            if outcome.success && outcome.coverage < 100.0 {
                outcome.success = false;
                outcome
                    .errors
                    .push(format!("insufficient test coverage: {:.0}%", outcome.coverage));
            }

            if outcome.success {
                self.apply_success(&mut sprint, &mut item, outcome.coverage).await?;
                succeeded.insert(item_id.clone());
            } else {
                item.set_status(WorkItemStatus::Blocked);
                self.persist_item(&item)?;
            }

            let success = outcome.success;
            report.results.push(ItemResult {
                item_id: item_id.clone(),
                success,
                coverage: outcome.coverage,
                errors: outcome.errors,
            });

            if !success {
                warn!(item = %item_id, "Execution failed; halting remaining run");
                report.halted_on = Some(item_id);
                break;
            }
        }

        info!(
            sprint = %sprint.id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            halted = report.halted_on.is_some(),
            "Sprint run finished"
        );
        Ok(report)
    }

    /// Load the sprint's admitted items as scheduled items
    fn collect_items(&self, sprint: &Sprint) -> Result<Vec<ScheduledItem>> {
        let mut items = Vec::new();
        for id in &sprint.story_ids {
            match self.store.get::<Story>(id)? {
                Some(story) => items.push(ScheduledItem::Story(story)),
                None => warn!(item = %id, "Admitted story missing from store"),
            }
        }
        for id in &sprint.task_ids {
            match self.store.get::<Task>(id)? {
                Some(task) => items.push(ScheduledItem::Task(task)),
                None => warn!(item = %id, "Admitted task missing from store"),
            }
        }
        for id in &sprint.bug_ids {
            match self.store.get::<Bug>(id)? {
                Some(bug) => items.push(ScheduledItem::Bug(bug)),
                None => warn!(item = %id, "Admitted bug missing from store"),
            }
        }
        Ok(items)
    }

    /// A dependency is satisfied by a successful result earlier in this
    /// run, or by an item already Done in the store from earlier sprints.
    fn unmet_dependencies(&self, item: &ScheduledItem, succeeded: &HashSet<String>) -> Result<Vec<String>> {
        let mut unmet = Vec::new();
        for dep in item.deps() {
            if succeeded.contains(dep) || self.is_done_in_store(dep)? {
                continue;
            }
            unmet.push(dep.clone());
        }
        Ok(unmet)
    }

    fn is_done_in_store(&self, id: &str) -> Result<bool> {
        if let Some(story) = self.store.get::<Story>(id)? {
            return Ok(story.status.is_done());
        }
        if let Some(task) = self.store.get::<Task>(id)? {
            return Ok(task.status.is_done());
        }
        if let Some(bug) = self.store.get::<Bug>(id)? {
            return Ok(bug.status.is_done());
        }
        Ok(false)
    }

    /// Acquire the item's workspace, reusing an existing one
    async fn provision_workspace(&self, executor: &str, item_id: &str) -> Result<WorkspaceEntry, WorkspaceError> {
        match self.workspaces.create(executor, item_id).await {
            Ok(entry) => Ok(entry),
            Err(WorkspaceError::AlreadyExists(_)) => {
                let status = self.workspaces.status(item_id).await?;
                debug!(item = %item_id, state = %status.state, dirty = status.dirty, "Reusing existing workspace");
                self.workspaces
                    .index()
                    .get(item_id)?
                    .ok_or_else(|| WorkspaceError::NotFound(item_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_success(&self, sprint: &mut Sprint, item: &mut ScheduledItem, coverage: f64) -> Result<()> {
        match &mut *item {
            ScheduledItem::Task(task) => {
                let coverage = coverage.clamp(0.0, 100.0) as u8;
                task.set_progress(100, coverage).map_err(|e| eyre::eyre!(e))?;
            }
            other => other.set_status(WorkItemStatus::Done),
        }
        self.persist_item(item)?;

        if let Err(e) = self.workspaces.mark_completed(item.id()).await {
            warn!(item = %item.id(), error = %e, "Could not mark workspace completed");
        }

        sprint.completed_points += item.points();
        sprint.record_burndown(Utc::now().date_naive(), sprint.remaining_points());
        self.store.update(sprint.clone())?;
        Ok(())
    }

    fn persist_item(&self, item: &ScheduledItem) -> Result<()> {
        match item {
            ScheduledItem::Story(story) => self.store.update(story.clone())?,
            ScheduledItem::Task(task) => self.store.update(task.clone())?,
            ScheduledItem::Bug(bug) => self.store.update(bug.clone())?,
        }
        Ok(())
    }
}
