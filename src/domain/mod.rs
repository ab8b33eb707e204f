//! Domain types for the sprint scheduler
//!
//! Work items (Story, Task, Bug) and Sprint all implement the `Record`
//! trait for WorkStore persistence. `ScheduledItem` is the uniform view
//! the resolver and coordinator operate on.

mod id;
mod item;
mod priority;
mod sprint;

pub use id::{generate_id, resolve_reference};
pub use item::{
    Bug, ItemError, ItemKind, POINT_SCALE, ScheduledItem, Story, Task, WorkItemStatus, validate_points,
};
pub use priority::{Priority, Severity};
pub use sprint::{BurndownPoint, Sprint, SprintStatus};

// Re-export workstore types for convenience
pub use workstore::{Record, Store, StoreError};
