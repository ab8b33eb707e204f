//! Execution coordination
//!
//! Runs an active sprint's items through the resolved dependency order,
//! one at a time, provisioning an isolated workspace per item and
//! delegating the actual work to an external executor.

mod core;
mod executor;

pub use self::core::{ExecutionCoordinator, ItemResult, RunReport};
pub use executor::{CommandExecutor, ExecutionOutcome, ItemExecutor};
