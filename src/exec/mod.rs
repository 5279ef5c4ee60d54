// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`executor_loop`] receives scheduled tasks and runs each one through the
//!   [`TaskRegistry`](crate::registry::TaskRegistry) on a blocking thread,
//!   reporting `TaskCompleted` back to the runtime.
//! - [`backend`] provides the [`ExecutorBackend`] seam the runtime talks to,
//!   so tests can swap in a fake executor.

pub mod backend;
pub mod executor_loop;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::spawn_executor;
