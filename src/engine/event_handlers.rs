// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep, TaskRunState};
use crate::engine::core::{RunSummary, ServePhase};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeOptions, TaskName, TaskOutcome, TriggerReason};
use crate::server::ReloadKind;
use crate::types::AssetClass;

/// Command produced by the core for the IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Hand these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Notify connected browsers.
    Reload(ReloadKind),
    /// Stop the runtime (build mode, once idle).
    RequestExit,
}

/// Decision returned by the core after handling one event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Mutable state the handlers operate on.
#[derive(Debug)]
pub struct CoreState {
    pub scheduler: Scheduler,
    pub queue: TriggerQueue,
    pub phase: ServePhase,
    pub summary: RunSummary,
}

/// Reload to broadcast after `asset` rebuilt successfully during serving.
pub fn reload_kind_for(asset: Option<AssetClass>) -> Option<ReloadKind> {
    match asset? {
        AssetClass::Styles => Some(ReloadKind::Styles),
        AssetClass::Scripts | AssetClass::Images | AssetClass::Icons => Some(ReloadKind::Full),
    }
}

/// Handle a task trigger.
///
/// When idle, a new run starts seeded with the trigger plus anything queued.
/// During a run, a task not yet part of it joins immediately; a task already
/// in the run is recorded in the queue for a follow-up run.
pub fn handle_task_trigger(
    state: &mut CoreState,
    options: &RuntimeOptions,
    task: TaskName,
    reason: TriggerReason,
) -> CoreStep {
    if state.phase == ServePhase::Stopped {
        debug!(task = %task, "trigger after shutdown; ignoring");
        return CoreStep::running(Vec::new());
    }

    let mut commands = Vec::new();

    if state.scheduler.is_idle() {
        let mut triggers: BTreeSet<TaskName> = state.queue.drain_pending().into_iter().collect();
        triggers.insert(task);
        debug!(?reason, count = triggers.len(), "starting run from trigger");
        commands.extend(start_new_run_from_triggers(state, triggers.into_iter().collect()));
        return finish_step(state, options, commands);
    }

    match state.scheduler.run_state_of(&task) {
        None => {
            debug!(task = %task, "trigger for unknown task; ignoring");
        }
        Some(TaskRunState::NotInRun) => {
            let step = state.scheduler.step_trigger(&task);
            commands.extend(apply_scheduler_step(state, step));
        }
        Some(_) => {
            debug!(task = %task, ?reason, "task already in active run; queueing rebuild");
            state.queue.record_trigger(&task);
        }
    }

    finish_step(state, options, commands)
}

/// Handle a task completion.
pub fn handle_task_completion(
    state: &mut CoreState,
    options: &RuntimeOptions,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let mut commands = Vec::new();

    if outcome.is_success() {
        state.summary.succeeded.push(task.clone());
        if state.phase == ServePhase::Rebuilding {
            if let Some(kind) = reload_kind_for(state.scheduler.asset_of(&task)) {
                commands.push(CoreCommand::Reload(kind));
            }
        }
    }

    let step = state.scheduler.step_completion(&task, &outcome);
    commands.extend(apply_scheduler_step(state, step));

    finish_step(state, options, commands)
}

/// Seed the first run with the requested tasks, each triggered manually.
pub fn handle_initial_run(
    state: &mut CoreState,
    options: &RuntimeOptions,
    tasks: Vec<TaskName>,
) -> CoreStep {
    info!(tasks = ?tasks, "starting initial run");
    let commands = start_new_run_from_triggers(state, tasks);
    if state.scheduler.is_idle() && state.phase == ServePhase::Idle {
        state.phase = ServePhase::Serving;
    }
    finish_step(state, options, commands)
}

/// Handle a change to a `reload_on` file.
pub fn handle_reload_request(state: &mut CoreState, path: &std::path::Path) -> CoreStep {
    let mut commands = Vec::new();
    if matches!(state.phase, ServePhase::Serving | ServePhase::Rebuilding) {
        debug!(path = %path.display(), "reload-only file changed");
        commands.push(CoreCommand::Reload(ReloadKind::Full));
    }
    CoreStep::running(commands)
}

pub fn handle_shutdown(state: &mut CoreState) -> CoreStep {
    info!(phase = ?state.phase, "shutdown requested");
    state.phase = ServePhase::Stopped;
    CoreStep {
        commands: Vec::new(),
        keep_running: false,
    }
}

/// Start a new run from a set of triggers. No-op for an empty set.
pub fn start_new_run_from_triggers(
    state: &mut CoreState,
    mut triggers: Vec<TaskName>,
) -> Vec<CoreCommand> {
    triggers.retain(|task| {
        let known = state.scheduler.run_state_of(task).is_some();
        if !known {
            debug!(task = %task, "dropping trigger for unknown task");
        }
        known
    });
    if triggers.is_empty() {
        return Vec::new();
    }

    state.scheduler.start_new_run();
    state.phase = match state.phase {
        ServePhase::Idle | ServePhase::Starting => ServePhase::Starting,
        ServePhase::Serving | ServePhase::Rebuilding => ServePhase::Rebuilding,
        ServePhase::Stopped => ServePhase::Stopped,
    };

    let mut commands = Vec::new();
    for task in triggers {
        let step = state.scheduler.step_trigger(&task);
        commands.extend(apply_scheduler_step(state, step));
    }
    commands
}

/// Record failures and translate newly scheduled tasks into a dispatch.
/// Starts a queued run when the step finished the active one.
fn apply_scheduler_step(state: &mut CoreState, step: SchedulerStep) -> Vec<CoreCommand> {
    let mut commands = Vec::new();

    state.summary.failed.extend(step.newly_failed);
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }

    if step.run_just_finished {
        if state.phase == ServePhase::Starting || state.phase == ServePhase::Rebuilding {
            state.phase = ServePhase::Serving;
        }
        let queued = state.queue.drain_pending();
        if !queued.is_empty() {
            debug!(tasks = ?queued, "starting queued follow-up run");
            commands.extend(start_new_run_from_triggers(state, queued));
        }
    }

    commands
}

fn finish_step(
    state: &mut CoreState,
    options: &RuntimeOptions,
    mut commands: Vec<CoreCommand>,
) -> CoreStep {
    if options.exit_when_idle && state.scheduler.is_idle() && state.queue.is_empty() {
        commands.push(CoreCommand::RequestExit);
        return CoreStep {
            commands,
            keep_running: false,
        };
    }
    CoreStep::running(commands)
}
