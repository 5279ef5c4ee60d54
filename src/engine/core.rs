// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! [`CoreRuntime::step`] consumes one [`RuntimeEvent`] and returns the
//! commands the IO shell should carry out. No channels, no Tokio, no IO, so
//! every rule about runs, queueing, and reloads is testable synchronously.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_initial_run, handle_reload_request, handle_shutdown, handle_task_completion,
    handle_task_trigger, CoreState, CoreStep,
};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions, TaskName};
use crate::types::TriggerWhileRunningBehaviour;

/// Lifecycle of the dev server. Build mode walks the same phases and exits
/// after the first run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServePhase {
    Idle,
    /// Initial pass over the requested tasks.
    Starting,
    Serving,
    /// A watch-triggered run is active.
    Rebuilding,
    Stopped,
}

/// Task outcomes accumulated over the lifetime of the runtime, in completion
/// order. `failed` includes tasks blocked by a failed dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: Vec<TaskName>,
    pub failed: Vec<TaskName>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct CoreRuntime {
    state: CoreState,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(
        scheduler: Scheduler,
        behaviour: TriggerWhileRunningBehaviour,
        queue_length: usize,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            state: CoreState {
                scheduler,
                queue: TriggerQueue::new(behaviour, queue_length),
                phase: ServePhase::Idle,
                summary: RunSummary::default(),
            },
            options,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state.scheduler.is_idle()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.state.queue.is_empty()
    }

    pub fn phase(&self) -> ServePhase {
        self.state.phase
    }

    pub fn summary(&self) -> &RunSummary {
        &self.state.summary
    }

    pub fn into_summary(self) -> RunSummary {
        self.state.summary
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.state.scheduler
    }

    /// Start the first run. In build mode an empty task list yields an
    /// immediate exit.
    pub fn start(&mut self, tasks: Vec<TaskName>) -> CoreStep {
        handle_initial_run(&mut self.state, &self.options, tasks)
    }

    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered { task, reason } => {
                handle_task_trigger(&mut self.state, &self.options, task, reason)
            }
            RuntimeEvent::TaskCompleted { task, outcome } => {
                handle_task_completion(&mut self.state, &self.options, task, outcome)
            }
            RuntimeEvent::ReloadRequested { path } => handle_reload_request(&mut self.state, &path),
            RuntimeEvent::ShutdownRequested => handle_shutdown(&mut self.state),
        }
    }
}
