// src/config/resolver.rs

//! Path resolution for asset classes.
//!
//! `resolve` is a pure lookup on the validated configuration. The glob
//! helpers at the bottom are shared by validation, source expansion and the
//! watcher so that all three agree on what a pattern means.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::model::ConfigFile;
use crate::errors::{AssetflowError, Result};
use crate::types::AssetClass;

/// Where an asset class reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub class: AssetClass,
    /// Source globs in declared order.
    pub sources: Vec<String>,
    pub destination: PathBuf,
}

pub fn resolve(cfg: &ConfigFile, class: AssetClass) -> ResolvedPaths {
    let asset = cfg.asset(class);
    ResolvedPaths {
        class,
        sources: asset.src.clone(),
        destination: PathBuf::from(&asset.dest),
    }
}

/// Like [`resolve`], for a class given by name.
pub fn resolve_named(cfg: &ConfigFile, class: &str) -> Result<ResolvedPaths> {
    let class: AssetClass = class.parse().map_err(AssetflowError::ConfigError)?;
    Ok(resolve(cfg, class))
}

/// Compile one glob with `/`-aware wildcards (`*` never crosses a directory).
pub fn compile_glob(pattern: &str) -> anyhow::Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

pub fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    Ok(builder.build()?)
}

/// The leading directories of `pattern` that contain no glob syntax.
///
/// `src/css/*.css` → `src/css`, `src/img/**/*.png` → `src/img`,
/// `*.css` → ``.
pub fn literal_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let parts: Vec<&str> = pattern.split('/').collect();
    // The last segment names files, never a directory.
    for part in &parts[..parts.len().saturating_sub(1)] {
        if part.contains(['*', '?', '[', '{']) {
            break;
        }
        if !part.is_empty() {
            base.push(part);
        }
    }
    normalize(&base)
}

/// Whether one path is a prefix of the other after dropping `.` components.
pub fn paths_overlap(a: &Path, b: &Path) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    a.starts_with(&b) || b.starts_with(&a)
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
