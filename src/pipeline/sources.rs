// src/pipeline/sources.rs

//! Glob expansion for task sources.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::resolver::{build_globset, compile_glob, literal_base};
use crate::fs::FileSystem;

/// A matched source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Path relative to the literal base of the glob that matched it; the
    /// output keeps this layout below the destination.
    pub relative: PathBuf,
    /// Project-relative path with forward slashes.
    pub source: String,
}

/// Expand `globs` below `root`.
///
/// Matches are sorted within each glob, globs contribute in declared order
/// and a file matched by several globs is kept at its first position.
pub fn expand(
    fs: &dyn FileSystem,
    root: &Path,
    globs: &[String],
    exclude: &[String],
) -> Result<Vec<SourceEntry>> {
    let exclude_set = if exclude.is_empty() {
        None
    } else {
        Some(build_globset(exclude)?)
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for pattern in globs {
        let matcher = compile_glob(pattern)?.compile_matcher();
        let base = literal_base(pattern);
        let dir = root.join(&base);
        if !fs.is_dir(&dir) {
            warn!(glob = %pattern, dir = %dir.display(), "source directory does not exist");
            continue;
        }

        let mut matched = Vec::new();
        for path in walk_files(fs, &dir)? {
            let Some(rel) = project_relative(root, &path) else {
                continue;
            };
            if !matcher.is_match(&rel) {
                continue;
            }
            if exclude_set.as_ref().is_some_and(|ex| ex.is_match(&rel)) {
                continue;
            }
            matched.push(rel);
        }
        matched.sort();
        debug!(glob = %pattern, count = matched.len(), "expanded glob");

        for rel in matched {
            if !seen.insert(rel.clone()) {
                continue;
            }
            let relative = Path::new(&rel)
                .strip_prefix(&base)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(&rel));
            entries.push(SourceEntry {
                relative,
                source: rel,
            });
        }
    }

    Ok(entries)
}

fn walk_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

fn project_relative(root: &Path, path: &Path) -> Option<String> {
    let rel = clean(path).strip_prefix(clean(root)).ok()?.to_path_buf();
    Some(rel.to_string_lossy().replace('\\', "/"))
}

fn clean(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
