//! sprintd - capacity-constrained sprint scheduler
//!
//! Schedules stories, tasks, and bugs into time-boxed sprints under a
//! velocity cap, orders execution by declared dependencies, and gives
//! every scheduled item an isolated branch-backed workspace so concurrent
//! executors could never collide on filesystem state.
//!
//! # Core Concepts
//!
//! - **Capacity first**: greedy admission under the sprint's velocity;
//!   critical bugs jump the queue, unestimated stories never board
//! - **Dependencies ordered**: depth-first topological sort with explicit
//!   cycle rejection
//! - **One sprint active**: a scheduler session owns the single-active
//!   invariant; transitions cascade item status
//! - **Fail-fast runs**: strictly sequential execution, halted at the
//!   first failing item
//! - **Isolated workspaces**: one branch + directory per
//!   (executor, work-item) pair, tracked in a file-locked metadata index
//!
//! # Modules
//!
//! - [`domain`] - work-item and sprint records
//! - [`planner`] - capacity planning and velocity derivation
//! - [`resolver`] - dependency-respecting execution order
//! - [`lifecycle`] - sprint state machine
//! - [`coordinator`] - sequential fail-fast execution
//! - [`workspace`] - branch-backed workspace isolation
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod lifecycle;
pub mod planner;
pub mod resolver;
pub mod workspace;

// Re-export commonly used types
pub use config::{Config, ExecutorConfig, GitConfig, PlannerConfig, StorageConfig};
pub use coordinator::{CommandExecutor, ExecutionCoordinator, ExecutionOutcome, ItemExecutor, ItemResult, RunReport};
pub use domain::{
    Bug, ItemError, ItemKind, Priority, Record, ScheduledItem, Severity, Sprint, SprintStatus, Store, StoreError,
    Story, Task, WorkItemStatus,
};
pub use lifecycle::{LifecycleError, SchedulerSession, SprintLifecycle};
pub use planner::{CapacityPlanner, PlanError, SprintPlan, derive_velocity};
pub use resolver::{ResolveError, execution_order, order_items};
pub use workspace::{
    GitRunner, ProcOutput, ReviewOutcome, WorkspaceConfig, WorkspaceEntry, WorkspaceError, WorkspaceIndex,
    WorkspaceManager, WorkspaceState, WorkspaceStatus,
};
