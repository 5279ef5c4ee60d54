// src/engine/queue.rs

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::engine::TaskName;
use crate::types::TriggerWhileRunningBehaviour;

/// Rebuild requests that arrived for tasks already part of the active run.
///
/// Each entry is a batch of task names for one follow-up run. In queue mode
/// new requests merge into the newest batch, so any number of saves during a
/// rebuild collapse into a single follow-up run. At most `max_runs` batches
/// are kept; the oldest are dropped first. In cancel mode the queue holds only
/// the latest request.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_runs: usize,
    runs: VecDeque<BTreeSet<TaskName>>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn behaviour(&self) -> TriggerWhileRunningBehaviour {
        self.behaviour
    }

    pub fn record_trigger(&mut self, task: &str) {
        match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => {
                match self.runs.back_mut() {
                    Some(batch) => {
                        let inserted = batch.insert(task.to_string());
                        debug!(task = %task, inserted, "coalesced rebuild into queued batch");
                    }
                    None => {
                        self.runs.push_back(BTreeSet::from([task.to_string()]));
                        debug!(task = %task, "queued rebuild for after the active run");
                    }
                }

                if self.runs.len() > self.max_runs {
                    warn!(
                        batches = self.runs.len(),
                        max_runs = self.max_runs,
                        "queue_length exceeded; dropping oldest queued batches"
                    );
                    while self.runs.len() > self.max_runs {
                        self.runs.pop_front();
                    }
                }
            }
            TriggerWhileRunningBehaviour::Cancel => {
                debug!(task = %task, "replacing queued batches (cancel mode)");
                self.runs.clear();
                self.runs.push_back(BTreeSet::from([task.to_string()]));
            }
        }
    }

    /// Merge every queued batch into one sorted list of task names.
    pub fn drain_pending(&mut self) -> Vec<TaskName> {
        let merged: BTreeSet<TaskName> = self.runs.drain(..).flatten().collect();
        debug!(drained = merged.len(), "drained queued rebuilds");
        merged.into_iter().collect()
    }
}
