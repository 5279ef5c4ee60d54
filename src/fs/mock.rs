// src/fs/mock.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::FileSystem;

/// In-memory filesystem. Directories exist implicitly as prefixes of files.
///
/// Clones share the same storage, so a test can hand one clone to the
/// registry and inspect written outputs through another.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.lock().insert(clean(path.as_ref()), content.into());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.lock().remove(&clean(path.as_ref()));
    }

    /// Every stored file path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn clean(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.lock()
            .get(&clean(path))
            .cloned()
            .ok_or_else(|| anyhow!("file not found: {path:?}"))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.lock().contains_key(&clean(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = clean(path);
        self.lock()
            .keys()
            .any(|f| f != &dir && f.starts_with(&dir))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let dir = clean(path);
        let files = self.lock();
        let mut children = BTreeSet::new();
        for file in files.keys() {
            if let Ok(rest) = file.strip_prefix(&dir) {
                if let Some(first) = rest.components().next() {
                    if !rest.as_os_str().is_empty() {
                        children.insert(dir.join(first));
                    }
                }
            }
        }
        if children.is_empty() {
            return Err(anyhow!("not a directory or not found: {path:?}"));
        }
        Ok(children.into_iter().collect())
    }
}
