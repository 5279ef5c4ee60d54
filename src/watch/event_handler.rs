// src/watch/event_handler.rs

//! Turning one changed path into runtime events.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::fs::FileSystem;
use crate::watch::cache::FileCache;
use crate::watch::hash::{compute_aggregate_hash, HashStore};
use crate::watch::path_utils::{is_editor_artifact, relative_str};
use crate::watch::patterns::{collect_matching_files, WatchAction, WatchBinding};

/// State shared by every change the watcher processes.
#[derive(Clone)]
pub struct WatchState {
    pub fs: Arc<dyn FileSystem>,
    pub root: PathBuf,
    pub bindings: Arc<Vec<WatchBinding>>,
    pub hash_store: Arc<Mutex<Box<dyn HashStore>>>,
    pub file_cache: Arc<Mutex<FileCache>>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Bindings interested in `rel_path`.
pub fn matching_bindings<'a>(
    bindings: &'a [WatchBinding],
    rel_path: &str,
) -> Vec<&'a WatchBinding> {
    bindings.iter().filter(|b| b.matches(rel_path)).collect()
}

/// Whether the aggregate content of everything `binding` watches differs
/// from the stored hash. Stores the new hash. Errors count as changed.
pub fn content_changed(
    fs: &dyn FileSystem,
    root: &Path,
    binding: &WatchBinding,
    changed: &Path,
    store: &mut dyn HashStore,
    cache: &mut FileCache,
) -> bool {
    cache.invalidate(changed);
    let Some(hash) = aggregate_hash(fs, root, binding, cache) else {
        return true;
    };

    let key = binding.label();
    if store.load(&key).as_deref() == Some(hash.as_str()) {
        return false;
    }
    store.save(&key, &hash);
    true
}

/// Record the current content hash of every `use_hash` binding, so the first
/// save that changes nothing does not rebuild.
pub fn seed_hashes(state: &WatchState) {
    let mut store = lock(&state.hash_store);
    let mut cache = lock(&state.file_cache);
    for binding in state.bindings.iter().filter(|b| b.use_hash()) {
        if let Some(hash) = aggregate_hash(state.fs.as_ref(), &state.root, binding, &mut cache) {
            store.save(&binding.label(), &hash);
        }
    }
}

fn aggregate_hash(
    fs: &dyn FileSystem,
    root: &Path,
    binding: &WatchBinding,
    cache: &mut FileCache,
) -> Option<String> {
    let files = match collect_matching_files(fs, root, binding) {
        Ok(files) => files,
        Err(err) => {
            warn!(binding = %binding.label(), error = %err, "failed to collect watched files");
            return None;
        }
    };

    let mut hashes = Vec::with_capacity(files.len());
    for file in &files {
        match cache.get_or_compute(fs, file) {
            Ok(hash) => hashes.push(hash),
            Err(err) => {
                warn!(file = %file.display(), error = %err, "failed to hash watched file");
                return None;
            }
        }
    }
    Some(compute_aggregate_hash(&hashes))
}

/// Process one changed path. Returns `false` once the runtime channel is
/// closed.
pub async fn process_file_change(
    state: &WatchState,
    path: &Path,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> bool {
    let Some(rel) = relative_str(&state.root, path) else {
        debug!(path = %path.display(), "event outside the project root");
        return true;
    };
    if is_editor_artifact(&rel) {
        return true;
    }

    let matching = matching_bindings(&state.bindings, &rel);
    if matching.is_empty() {
        return true;
    }

    for binding in matching {
        if binding.use_hash() && !hash_check(state, binding, path).await {
            info!(binding = %binding.label(), path = %rel, "content unchanged; skipping");
            continue;
        }

        let event = match binding.action() {
            WatchAction::Task(task) => {
                debug!(task = %task, path = %rel, "watch match");
                RuntimeEvent::TaskTriggered {
                    task: task.clone(),
                    reason: TriggerReason::FileWatch,
                }
            }
            WatchAction::Reload => RuntimeEvent::ReloadRequested {
                path: PathBuf::from(&rel),
            },
        };

        if let Err(err) = runtime_tx.send(event).await {
            warn!("runtime channel closed: {err}");
            return false;
        }
    }

    true
}

async fn hash_check(state: &WatchState, binding: &WatchBinding, path: &Path) -> bool {
    let state = state.clone();
    let binding = binding.clone();
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut store = lock(&state.hash_store);
        let mut cache = lock(&state.file_cache);
        content_changed(
            state.fs.as_ref(),
            &state.root,
            &binding,
            &path,
            &mut **store,
            &mut cache,
        )
    })
    .await
    .unwrap_or(true)
}
