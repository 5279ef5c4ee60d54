// src/watch/mod.rs

//! File watching for the dev server.
//!
//! Turns filesystem changes into `TaskTriggered` events for the task owning
//! the changed file, or into `ReloadRequested` for `server.reload_on` files.
//! Knows nothing about task dependencies.

pub mod cache;
pub mod event_handler;
pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use hash::{HashStore, MemoryHashStore};
pub use patterns::{build_bindings, WatchAction, WatchBinding};
pub use watcher::{spawn_watcher, WatcherHandle};
