//! Sprint capacity planning
//!
//! Greedy bin-packing of backlog items into a sprint under the velocity
//! cap: critical bugs first, then estimated stories by priority, then the
//! admitted stories' tasks, then remaining bugs into leftover capacity.

mod capacity;
mod velocity;

pub use capacity::{CapacityPlanner, PlanError, SprintPlan};
pub use velocity::derive_velocity;
