// src/registry/mod.rs

//! Named tasks and their execution.
//!
//! A [`TaskRegistry`] starts with the tasks of the loaded configuration and
//! accepts further ones through [`TaskRegistry::register`]. Running a task
//! expands its sources, pushes them through its stage subset and writes the
//! result below the asset's destination directory.

mod runner;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Datelike;

use crate::config::model::{ConfigFile, TaskSpec};
use crate::config::validate::ensure_ordered_subset;
use crate::errors::{AssetflowError, Result};
use crate::fs::FileSystem;
use crate::pipeline::DiagnosticSink;
use crate::types::{AssetClass, StageKind};

/// What a single task run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: String,
    /// Project-relative sources that were read.
    pub inputs: Vec<String>,
    /// Files written, as paths below the project root.
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct TaskRegistry {
    config: Arc<ConfigFile>,
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    sink: Arc<dyn DiagnosticSink>,
    year: i32,
    tasks: BTreeMap<String, TaskSpec>,
}

impl TaskRegistry {
    /// A registry holding every task of `config`. Paths resolve against
    /// `root`.
    pub fn new(
        config: Arc<ConfigFile>,
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let tasks = config.tasks().clone();
        Self {
            config,
            root: root.into(),
            fs,
            sink,
            year: chrono::Local::now().year(),
            tasks,
        }
    }

    /// Override the banner year.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Add a task. `stages` defaults to the full pipeline of `class` and
    /// must otherwise keep that pipeline's order; `after` may only name
    /// tasks that are already registered.
    pub fn register(
        &mut self,
        name: &str,
        class: Option<AssetClass>,
        stages: Option<Vec<StageKind>>,
        after: Vec<String>,
    ) -> Result<()> {
        if self.tasks.contains_key(name) {
            return Err(AssetflowError::config(format!(
                "task '{name}' is already registered"
            )));
        }

        let stages = match (class, stages) {
            (None, Some(_)) => {
                return Err(AssetflowError::config(format!(
                    "task '{name}': stages require an asset class"
                )));
            }
            (None, None) => Vec::new(),
            (Some(class), None) => self.config.asset(class).stages.clone(),
            (Some(class), Some(wanted)) => {
                ensure_ordered_subset(&wanted, &self.config.asset(class).stages).map_err(
                    |stage| {
                        AssetflowError::config(format!(
                            "task '{name}': stage '{stage}' is not in the {class} pipeline or out of order"
                        ))
                    },
                )?;
                wanted
            }
        };

        if let Some(dep) = after.iter().find(|d| !self.tasks.contains_key(d.as_str())) {
            return Err(AssetflowError::config(format!(
                "task '{name}' has unknown dependency '{dep}'"
            )));
        }

        self.tasks.insert(
            name.to_string(),
            TaskSpec {
                name: name.to_string(),
                asset: class,
                stages,
                after,
                watch: class.is_some(),
                use_hash: self.config.config().use_hash,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }
}
