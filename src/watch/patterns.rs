// src/watch/patterns.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::config::model::ConfigFile;
use crate::config::resolver::{build_globset, literal_base};
use crate::engine::TaskName;
use crate::fs::FileSystem;

/// What a matching change causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    /// Rebuild this task.
    Task(TaskName),
    /// Reload connected browsers without building anything.
    Reload,
}

/// Compiled watch/exclude globs paired with the action they trigger.
///
/// Patterns are relative to the project root; the watcher passes relative
/// paths such as `"src/css/app.css"` into [`WatchBinding::matches`].
#[derive(Clone)]
pub struct WatchBinding {
    action: WatchAction,
    patterns: Vec<String>,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
    use_hash: bool,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("action", &self.action)
            .field("patterns", &self.patterns)
            .field("use_hash", &self.use_hash)
            .finish_non_exhaustive()
    }
}

impl WatchBinding {
    pub fn new(
        action: WatchAction,
        watch: &[String],
        exclude: &[String],
        use_hash: bool,
    ) -> Result<Self> {
        let label = action.to_string();
        let watch_set =
            build_globset(watch).with_context(|| format!("building watch globs for {label}"))?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(exclude)
                    .with_context(|| format!("building exclude globs for {label}"))?,
            )
        };
        Ok(Self {
            action,
            patterns: watch.to_vec(),
            watch_set,
            exclude_set,
            use_hash,
        })
    }

    pub fn action(&self) -> &WatchAction {
        &self.action
    }

    /// Key under which content hashes for this binding are stored.
    pub fn label(&self) -> String {
        self.action.to_string()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    /// Literal directories the watch globs are rooted at, deduplicated.
    pub fn base_dirs(&self) -> Vec<PathBuf> {
        let bases: BTreeSet<PathBuf> = self.patterns.iter().map(|p| literal_base(p)).collect();
        bases.into_iter().collect()
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.watch_set.is_match(rel_path)
            && !self
                .exclude_set
                .as_ref()
                .is_some_and(|ex| ex.is_match(rel_path))
    }
}

impl fmt::Display for WatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchAction::Task(name) => write!(f, "task '{name}'"),
            WatchAction::Reload => f.write_str("reload_on"),
        }
    }
}

/// One binding per watched, asset-bound task (using its asset's watch and
/// exclude globs) plus a reload-only binding for `server.reload_on`.
pub fn build_bindings(cfg: &ConfigFile) -> Result<Vec<WatchBinding>> {
    let mut bindings = Vec::new();

    for task in cfg.tasks().values() {
        let Some(class) = task.asset else {
            continue;
        };
        if !task.watch {
            continue;
        }
        let asset = cfg.asset(class);
        bindings.push(WatchBinding::new(
            WatchAction::Task(task.name.clone()),
            &asset.watch,
            &asset.exclude,
            task.use_hash,
        )?);
    }

    let reload_on = &cfg.server().reload_on;
    if !reload_on.is_empty() {
        bindings.push(WatchBinding::new(WatchAction::Reload, reload_on, &[], false)?);
    }

    Ok(bindings)
}

/// Every file below `root` the binding matches, sorted. Only the literal
/// base directories of its globs are walked; missing ones are skipped.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    binding: &WatchBinding,
) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();

    for base in binding.base_dirs() {
        let mut stack = vec![root.join(base)];
        while let Some(dir) = stack.pop() {
            if !fs.is_dir(&dir) {
                continue;
            }
            for path in fs.read_dir(&dir)? {
                if fs.is_dir(&path) {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(root) {
                    let rel = rel.to_string_lossy().replace('\\', "/");
                    if binding.matches(&rel) {
                        files.insert(path);
                    }
                }
            }
        }
    }

    Ok(files.into_iter().collect())
}
