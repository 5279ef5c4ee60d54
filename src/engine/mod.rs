// src/engine/mod.rs

//! Orchestration engine.
//!
//! The pure state machine in [`core`] owns the scheduler and the trigger
//! queue and turns [`RuntimeEvent`]s into [`CoreCommand`]s. The async shell in
//! [`runtime`] feeds it from a single channel (watcher, executor, Ctrl-C) and
//! carries the commands out.

/// Task names are plain strings throughout the engine.
pub type TaskName = String;

/// Outcome of one task run as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// Carries the rendered error.
    Failed(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Requested at startup (build, or the initial pass of serve).
    Manual,
    /// A watched source changed.
    FileWatch,
}

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Stop once the scheduler is idle and nothing is queued. Set for
    /// `build`; `serve` keeps running until Ctrl-C.
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// A `server.reload_on` file changed.
    ReloadRequested {
        path: std::path::PathBuf,
    },
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::{CoreRuntime, RunSummary, ServePhase};
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::TriggerQueue;
pub use runtime::Runtime;
