// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::errors::AssetflowError;
use crate::fs::FileSystem;
use crate::watch::cache::FileCache;
use crate::watch::event_handler::{process_file_change, seed_hashes, WatchState};
use crate::watch::hash::{HashStore, MemoryHashStore};
use crate::watch::patterns::{WatchAction, WatchBinding};

/// Keeps the underlying notify watcher alive; dropping it stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    active: usize,
}

impl WatcherHandle {
    /// Number of bindings that survived the startup checks.
    pub fn active_bindings(&self) -> usize {
        self.active
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Drop task bindings none of whose source directories exist. Each missing
/// directory is reported as a watch error. Reload bindings are kept, since
/// they usually point into the build output, which appears later.
pub fn active_bindings(
    fs: &dyn FileSystem,
    root: &std::path::Path,
    bindings: Vec<WatchBinding>,
) -> Vec<WatchBinding> {
    bindings
        .into_iter()
        .filter(|binding| {
            if *binding.action() == WatchAction::Reload {
                return true;
            }
            let bases = binding.base_dirs();
            let missing: Vec<_> = bases.iter().filter(|b| !fs.is_dir(&root.join(b))).collect();
            for dir in &missing {
                let err = AssetflowError::WatchError(format!(
                    "source directory {} for {} does not exist",
                    dir.display(),
                    binding.label()
                ));
                warn!("{err}");
            }
            let keep = missing.len() < bases.len();
            if !keep {
                warn!(binding = %binding.label(), "watching disabled");
            }
            keep
        })
        .collect()
}

/// Watch `root` recursively and forward matching changes to the runtime.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    bindings: Vec<WatchBinding>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    fs: Arc<dyn FileSystem>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    let bindings = active_bindings(fs.as_ref(), &root, bindings);
    let active = bindings.len();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event_tx.send(event).is_err() {
                    eprintln!("assetflow: watcher event loop gone; dropping event");
                }
            }
            Err(err) => eprintln!("assetflow: file watch error: {err}"),
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(root = %root.display(), bindings = active, "file watcher started");

    let hash_store: Box<dyn HashStore> = Box::new(MemoryHashStore::new());
    let state = WatchState {
        fs,
        root,
        bindings: Arc::new(bindings),
        hash_store: Arc::new(Mutex::new(hash_store)),
        file_cache: Arc::new(Mutex::new(FileCache::new())),
    };

    tokio::spawn(async move {
        let seed_state = state.clone();
        if tokio::task::spawn_blocking(move || seed_hashes(&seed_state))
            .await
            .is_err()
        {
            warn!("seeding watch hashes failed");
        }

        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            debug!(?event, "received notify event");

            for path in &event.paths {
                if !process_file_change(&state, path, &runtime_tx).await {
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        active,
    })
}
