// src/dag/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::dag::DagGraph;
use crate::engine::TaskName;

pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Add `root` to this run, together with every upstream task that has
    /// never succeeded and is not already part of the run.
    ///
    /// Upstream tasks with a successful history are satisfied by it and are
    /// left out, so a watch rebuild only re-runs the owning task.
    pub fn mark_pending_with_missing_upstream(&mut self, root: &str) {
        let mut stack: Vec<TaskName> = vec![root.to_string()];
        let mut visited: HashSet<TaskName> = HashSet::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(info) = self.tasks.get_mut(&name) else {
                warn!(task = %name, "node in DAG not present in tasks map");
                continue;
            };

            let is_root = name == root;
            if info.run_state.is_none() && (is_root || info.last_successful_run.is_none()) {
                info.run_state = Some(RunState::Pending);
                debug!(task = %info.name, "marked Pending for this run");
            }

            if info.run_state == Some(RunState::Pending) {
                stack.extend(self.graph.dependencies_of(&name).iter().cloned());
            }
        }
    }

    pub fn tasks_contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        ReadOnlyStateManager::new(self.tasks).deps_satisfied_for_info(info)
    }

    /// Mark the triggered dependents of a failed task (transitively) as
    /// `DoneFailed` for this run. Returns them, without `failed_task`.
    pub fn mark_dependents_failed(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self.graph.dependents_of(failed_task).to_vec();
        let mut newly_failed = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(info) = self.tasks.get_mut(&name) {
                if matches!(info.run_state, Some(RunState::Pending | RunState::Running)) {
                    info.run_state = Some(RunState::DoneFailed);
                    debug!(
                        task = %info.name,
                        "marking dependent as DoneFailed due to upstream failure"
                    );
                    newly_failed.push(info.name.clone());
                    stack.extend(self.graph.dependents_of(&name).iter().cloned());
                }
            }
        }

        newly_failed
    }

    /// Fail every pending task that waits on a dependency which already
    /// failed in this run. Such tasks could otherwise never become ready.
    pub fn fail_blocked_tasks(&mut self) -> Vec<TaskName> {
        let mut newly_failed = Vec::new();
        loop {
            let blocked: Vec<TaskName> = self
                .tasks
                .values()
                .filter(|info| info.run_state == Some(RunState::Pending))
                .filter(|info| {
                    info.deps.iter().any(|d| {
                        self.tasks
                            .get(d)
                            .is_some_and(|dep| dep.run_state == Some(RunState::DoneFailed))
                    })
                })
                .map(|info| info.name.clone())
                .collect();
            if blocked.is_empty() {
                return newly_failed;
            }
            for name in blocked {
                if let Some(info) = self.tasks.get_mut(&name) {
                    info.run_state = Some(RunState::DoneFailed);
                    debug!(task = %name, "dependency already failed in this run");
                }
                newly_failed.push(name);
            }
        }
    }

    /// Move every pending task whose dependencies are satisfied to `Running`
    /// and return them.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let mut candidates: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|info| {
                info.run_state == Some(RunState::Pending) && self.deps_satisfied_for_info(info)
            })
            .map(|info| info.name.clone())
            .collect();
        candidates.sort();

        let mut ready = Vec::new();
        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                let is_rerun = info.last_successful_run.is_some() || info.last_failed_run.is_some();
                if is_rerun {
                    info!(task = %info.name, run_id = self.current_run_id, "rebuilding task");
                } else {
                    info!(task = %info.name, run_id = self.current_run_id, "building task");
                }

                info.run_state = Some(RunState::Running);
                ready.push(ScheduledTask::from_task_info(
                    info,
                    self.current_run_id.unwrap_or(0),
                ));
            }
        }

        ready
    }

    pub fn all_tasks_terminal(&self) -> bool {
        !self
            .tasks
            .values()
            .any(|info| matches!(info.run_state, Some(RunState::Pending | RunState::Running)))
    }
}

/// Dependency checks with shared access only.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// A dependency is satisfied when it succeeded in this run, or when it
    /// is not part of this run and succeeded in an earlier one.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| {
            let Some(dep) = self.tasks.get(dep_name) else {
                warn!(task = %info.name, dep = %dep_name, "dependency missing from tasks map");
                return false;
            };
            match dep.run_state {
                Some(RunState::DoneSuccess) => true,
                Some(RunState::DoneFailed | RunState::Pending | RunState::Running) => false,
                None => dep.last_successful_run.is_some(),
            }
        })
    }
}
