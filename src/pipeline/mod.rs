// src/pipeline/mod.rs

//! In-memory file sets and the stage pipeline that transforms them.
//!
//! A task run reads its sources into a [`FileSet`], pushes it through the
//! stages of its pipeline left to right and writes whatever comes out.
//! Stages never touch the destination directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::model::{AssetConfig, BrowserTargets, ProjectMetadata};
use crate::errors::StageError;
use crate::fs::FileSystem;
use crate::types::StageKind;

pub mod css;
pub mod diagnostics;
pub mod js;
pub mod sourcemap;
pub mod sources;
pub mod stages;
pub mod svg;

pub use diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
pub use sourcemap::{Prior, SourceMap};

/// A contiguous run of output lines that came from one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Project-relative path of the original source.
    pub source: String,
    /// First line (0-based) of the run in the current contents.
    pub start_line: usize,
    pub line_count: usize,
    /// Line (0-based) in `source` that `start_line` corresponds to.
    pub source_line: usize,
}

/// One file travelling through a pipeline.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Output path relative to the destination directory.
    pub path: PathBuf,
    pub contents: Vec<u8>,
    pub origins: Vec<Origin>,
    pub map: Option<SourceMap>,
}

impl SourceFile {
    /// A file read from `source` (project-relative) that will be written to
    /// `path` below the destination.
    pub fn from_source(
        path: impl Into<PathBuf>,
        source: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        let contents = contents.into();
        let origins = vec![Origin {
            source: source.into(),
            start_line: 0,
            line_count: line_count(&contents),
            source_line: 0,
        }];
        Self {
            path: path.into(),
            contents,
            origins,
            map: None,
        }
    }

    pub fn text(&self) -> Result<&str, StageError> {
        std::str::from_utf8(&self.contents).map_err(|e| StageError::Io {
            path: self.path.clone(),
            message: format!("not valid UTF-8: {e}"),
        })
    }

    pub fn set_text(&mut self, text: String) {
        self.contents = text.into_bytes();
    }

    /// Name used in diagnostics: the original source when there is exactly
    /// one, the output path otherwise.
    pub fn display_name(&self) -> String {
        match self.source_path() {
            Some(src) => src.to_string(),
            None => self.path.to_string_lossy().replace('\\', "/"),
        }
    }

    pub fn source_path(&self) -> Option<&str> {
        match self.origins.as_slice() {
            [only] => Some(&only.source),
            _ => None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }

    /// Map a line of the current contents back to `(source, source line)`.
    pub fn locate(&self, line: usize) -> Option<(&str, usize)> {
        locate_in(&self.origins, line)
    }

    /// Replace the contents with `text`, where `step` maps `text` back into
    /// the current contents.
    pub fn rewrite(&mut self, text: String, step: &SourceMap) {
        let prior = match &self.map {
            Some(map) => Prior::Map(map),
            None => Prior::Origins(&self.origins),
        };
        self.map = Some(sourcemap::compose(step, prior));
        self.set_text(text);
        stages::reset_origins(self);
    }
}

pub fn locate_in(origins: &[Origin], line: usize) -> Option<(&str, usize)> {
    origins
        .iter()
        .find(|o| line >= o.start_line && line < o.start_line + o.line_count)
        .map(|o| (o.source.as_str(), o.source_line + (line - o.start_line)))
}

pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

pub fn line_count(contents: &[u8]) -> usize {
    contents.iter().filter(|&&b| b == b'\n').count() + 1
}

/// Ordered sequence of in-memory files.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Vec<SourceFile>,
}

impl FileSet {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn into_files(self) -> Vec<SourceFile> {
        self.files
    }

    pub fn find(&self, file_name: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.file_name() == file_name)
    }

    /// Apply `f` to every file, stopping at the first error.
    pub fn try_map<F>(self, mut f: F) -> Result<FileSet, StageError>
    where
        F: FnMut(SourceFile) -> Result<SourceFile, StageError>,
    {
        let files = self
            .files
            .into_iter()
            .map(&mut f)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FileSet { files })
    }
}

impl IntoIterator for FileSet {
    type Item = SourceFile;
    type IntoIter = std::vec::IntoIter<SourceFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl FromIterator<SourceFile> for FileSet {
    fn from_iter<I: IntoIterator<Item = SourceFile>>(iter: I) -> Self {
        FileSet {
            files: iter.into_iter().collect(),
        }
    }
}

/// Everything a stage may consult besides its input files.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub asset: AssetConfig,
    pub browsers: BrowserTargets,
    pub metadata: ProjectMetadata,
    /// Copyright year printed by the banner stage.
    pub year: i32,
    /// Project root; origins are relative to it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub sink: Arc<dyn DiagnosticSink>,
}

/// A single transform step.
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;
    fn apply(&self, files: FileSet) -> Result<FileSet, StageError>;
}

/// Fixed, ordered list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn for_kinds(kinds: &[StageKind], ctx: &Arc<StageContext>) -> Self {
        Self::new(kinds.iter().map(|k| stages::build(*k, ctx)).collect())
    }

    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    pub fn run(&self, mut files: FileSet) -> Result<FileSet, StageError> {
        for stage in &self.stages {
            debug!(stage = %stage.kind(), files = files.len(), "applying stage");
            files = stage.apply(files)?;
        }
        Ok(files)
    }
}
