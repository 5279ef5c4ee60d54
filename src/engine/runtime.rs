// src/engine/runtime.rs

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::server::ReloadHub;

use super::core::{CoreRuntime, RunSummary, ServePhase};
use super::{CoreCommand, CoreStep, RuntimeEvent, TaskName};

/// Async shell around [`CoreRuntime`]: reads events from the runtime
/// channel, hands scheduled tasks to an [`ExecutorBackend`] and forwards
/// reload commands to the [`ReloadHub`].
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    reload_hub: Option<ReloadHub>,
    initial_tasks: Vec<TaskName>,
    ready: Option<oneshot::Sender<()>>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("initial_tasks", &self.initial_tasks)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            reload_hub: None,
            initial_tasks: Vec::new(),
            ready: None,
        }
    }

    /// Tasks to run once before reacting to events.
    pub fn with_initial_tasks(mut self, tasks: Vec<TaskName>) -> Self {
        self.initial_tasks = tasks;
        self
    }

    pub fn with_reload_hub(mut self, hub: ReloadHub) -> Self {
        self.reload_hub = Some(hub);
        self
    }

    /// Fired once, when the initial run has finished and the core first
    /// reaches [`ServePhase::Serving`].
    pub fn with_ready_signal(mut self, ready: oneshot::Sender<()>) -> Self {
        self.ready = Some(ready);
        self
    }

    fn signal_ready(&mut self) {
        if self.core.phase() != ServePhase::Serving {
            return;
        }
        if let Some(ready) = self.ready.take() {
            debug!("initial run finished; signalling ready");
            // The receiver may have given up already.
            let _ = ready.send(());
        }
    }

    /// Main event loop. Returns the outcomes of every task run.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!("assetflow runtime started");

        let initial = std::mem::take(&mut self.initial_tasks);
        let step = self.core.start(initial);
        if self.apply(step).await? {
            self.signal_ready();
            loop {
                let Some(event) = self.event_rx.recv().await else {
                    info!("runtime event channel closed; exiting");
                    break;
                };

                debug!(?event, "runtime received event");
                let step = self.core.step(event);
                if !self.apply(step).await? {
                    break;
                }
                self.signal_ready();
            }
        }

        info!(phase = ?self.core.phase(), "runtime exiting");
        Ok(self.core.into_summary())
    }

    /// Carry out the commands of one step; returns whether to keep running.
    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            self.execute_command(command).await?;
        }
        if !step.keep_running {
            info!("core requested exit; stopping runtime");
        }
        Ok(step.keep_running)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await?,
            CoreCommand::Reload(kind) => match &self.reload_hub {
                Some(hub) => hub.notify(kind),
                None => debug!(?kind, "no reload hub attached; dropping reload"),
            },
            CoreCommand::RequestExit => debug!("core issued RequestExit"),
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, run_id = tasks[0].run_id, "dispatching ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
