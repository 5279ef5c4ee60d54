// src/errors.rs

//! Crate-wide error types.
//!
//! - [`AssetflowError`] is what the loader, registry and orchestrator return.
//! - [`StageError`] is the failure type of a single transform stage; it only
//!   aborts the task run that hit it.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of one transform stage on one file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// Syntax error in a stylesheet or script.
    #[error("compile error in {file}:{line}: {message}")]
    Compile {
        file: String,
        line: usize,
        message: String,
    },

    /// Any other transform failure (malformed image, sprite clash, ...).
    #[error("{stage} failed on {file}: {message}")]
    Transform {
        stage: &'static str,
        file: String,
        message: String,
    },

    #[error("IO error on {path:?}: {message}")]
    Io { path: PathBuf, message: String },
}

impl StageError {
    pub fn transform(stage: &'static str, file: impl Into<String>, message: impl Into<String>) -> Self {
        StageError::Transform {
            stage,
            file: file.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AssetflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssetflowError {
    pub fn config(msg: impl Into<String>) -> Self {
        AssetflowError::ConfigError(msg.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetflowError>;
