// src/dag/task_info.rs

//! Task metadata and per-run state.

use crate::config::model::TaskSpec;
use crate::engine::TaskName;
use crate::types::AssetClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Part of this run, waiting on dependencies.
    Pending,
    /// Handed to the executor.
    Running,
    DoneSuccess,
    /// Failed, or blocked by a failed dependency.
    DoneFailed,
}

/// Read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneFailed,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::DoneSuccess) => TaskRunState::DoneSuccess,
            Some(RunState::DoneFailed) => TaskRunState::DoneFailed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    pub asset: Option<AssetClass>,
    pub deps: Vec<TaskName>,

    /// `None` when the task is not part of the current run.
    pub run_state: Option<RunState>,

    pub last_successful_run: Option<u64>,
    pub last_failed_run: Option<u64>,
}

impl TaskInfo {
    pub fn from_spec(spec: &TaskSpec) -> Self {
        Self {
            name: spec.name.clone(),
            asset: spec.asset,
            deps: spec.after.clone(),
            run_state: None,
            last_successful_run: None,
            last_failed_run: None,
        }
    }
}

/// A task the scheduler wants executed now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub asset: Option<AssetClass>,
    /// Shared by every task of the same run.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            asset: info.asset,
            run_id,
        }
    }
}
