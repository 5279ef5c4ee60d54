// src/dag/mod.rs

//! Task graph and per-run scheduling.
//!
//! - [`graph`]: adjacency lists of the task graph.
//! - [`scheduler`]: decides which tasks are ready and propagates failures.
//! - [`state_manager`]: per-run state transitions.
//! - [`task_info`]: task metadata and scheduled task type.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::DagGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, TaskRunState};
