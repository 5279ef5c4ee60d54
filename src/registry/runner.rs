// src/registry/runner.rs

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::errors::{AssetflowError, Result, StageError};
use crate::pipeline::sources;
use crate::pipeline::{FileSet, Pipeline, SourceFile, StageContext};
use crate::types::StageKind;

use super::{TaskRegistry, TaskReport};

impl TaskRegistry {
    /// Run one task to completion. Any stage failure aborts the run and is
    /// returned as is; lint findings only go to the diagnostic sink.
    pub fn run(&self, name: &str) -> Result<TaskReport> {
        let spec = self
            .tasks
            .get(name)
            .ok_or_else(|| AssetflowError::TaskNotFound(name.to_string()))?;
        let started = Instant::now();

        let Some(class) = spec.asset else {
            debug!(task = %name, "aggregate task; nothing to build");
            return Ok(TaskReport {
                task: name.to_string(),
                inputs: Vec::new(),
                outputs: Vec::new(),
                duration: started.elapsed(),
            });
        };

        let asset = self.config.asset(class).clone();
        let entries = sources::expand(self.fs.as_ref(), &self.root, &asset.src, &asset.exclude)?;
        debug!(task = %name, class = %class, sources = entries.len(), "expanded sources");

        let mut files = Vec::with_capacity(entries.len());
        for entry in &entries {
            let path = self.root.join(&entry.source);
            let contents = self.fs.read(&path).map_err(|e| StageError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
            files.push(SourceFile::from_source(
                entry.relative.clone(),
                entry.source.clone(),
                contents,
            ));
        }

        let dest = self.root.join(&asset.dest);
        let ctx = Arc::new(StageContext {
            asset,
            browsers: self.config.browsers().clone(),
            metadata: self.config.metadata().clone(),
            year: self.year,
            root: self.root.clone(),
            fs: Arc::clone(&self.fs),
            sink: Arc::clone(&self.sink),
        });
        let pipeline = Pipeline::for_kinds(&spec.stages, &ctx);
        let output = pipeline.run(FileSet::new(files))?;

        // A check-only subset (e.g. lint) produces no artifacts.
        let writes_output = spec.stages.iter().any(|k| *k != StageKind::Lint);
        let mut outputs = Vec::new();
        if writes_output {
            for file in output {
                let target = dest.join(&file.path);
                self.fs
                    .write(&target, &file.contents)
                    .map_err(|e| StageError::Io {
                        path: target.clone(),
                        message: e.to_string(),
                    })?;
                outputs.push(target);
            }
        }

        let report = TaskReport {
            task: name.to_string(),
            inputs: entries.into_iter().map(|e| e.source).collect(),
            outputs,
            duration: started.elapsed(),
        };
        info!(
            task = %name,
            inputs = report.inputs.len(),
            outputs = report.outputs.len(),
            elapsed_ms = report.duration.as_millis() as u64,
            "task complete"
        );
        Ok(report)
    }
}
