// src/exec/executor_loop.rs

//! Background loop that runs scheduled tasks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::registry::TaskRegistry;

/// Spawn the executor loop and return the sender the backend feeds.
///
/// Each task runs in its own Tokio task, with the pipeline itself on a
/// blocking thread. Runs of the same task name are chained, so a task is
/// never executed concurrently with itself.
pub fn spawn_executor(
    registry: Arc<TaskRegistry>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut active: HashMap<String, JoinHandle<()>> = HashMap::new();

        while let Some(task) = rx.recv().await {
            active.retain(|_, handle| !handle.is_finished());
            let previous = active.remove(&task.name);
            let name = task.name.clone();
            let handle = tokio::spawn(run_task(
                task,
                Arc::clone(&registry),
                runtime_tx.clone(),
                previous,
            ));
            active.insert(name, handle);
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

async fn run_task(
    task: ScheduledTask,
    registry: Arc<TaskRegistry>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        debug!(task = %task.name, "waiting for previous run of the same task");
        let _ = previous.await;
    }

    let name = task.name.clone();
    let result = tokio::task::spawn_blocking(move || registry.run(&name)).await;

    let outcome = match result {
        Ok(Ok(report)) => {
            debug!(
                task = %report.task,
                run_id = task.run_id,
                outputs = report.outputs.len(),
                "task finished"
            );
            TaskOutcome::Success
        }
        Ok(Err(err)) => {
            error!(task = %task.name, run_id = task.run_id, error = %err, "task failed");
            TaskOutcome::Failed(err.to_string())
        }
        Err(join_err) => {
            error!(task = %task.name, error = %join_err, "task panicked");
            TaskOutcome::Failed(join_err.to_string())
        }
    };

    let event = RuntimeEvent::TaskCompleted {
        task: task.name.clone(),
        outcome,
    };
    if runtime_tx.send(event).await.is_err() {
        debug!(task = %task.name, "runtime channel closed; dropping completion");
    }
}
