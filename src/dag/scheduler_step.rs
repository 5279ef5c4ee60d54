// src/dag/scheduler_step.rs

use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;

/// Result of a single scheduler step, for callers that need more than the
/// newly scheduled tasks.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks newly marked failed: the failing task and blocked dependents.
    pub newly_failed: Vec<TaskName>,
    /// The run finished with this step.
    pub run_just_finished: bool,
}
