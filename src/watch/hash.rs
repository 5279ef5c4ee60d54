use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// blake3 hex digest of one file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let bytes = fs
        .read(path)
        .with_context(|| format!("reading {path:?} for hashing"))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Digest over per-file digests. `hashes` must be ordered by file path.
pub fn compute_aggregate_hash(hashes: &[String]) -> String {
    let mut hasher = Hasher::new();
    for h in hashes {
        hasher.update(h.as_bytes());
    }
    let hash = hasher.finalize().to_hex().to_string();
    debug!(files = hashes.len(), hash = %hash, "computed aggregate hash");
    hash
}

/// Last seen aggregate hash per watch binding.
pub trait HashStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&mut self, key: &str, hash: &str);
}

/// Hashes live for the lifetime of the dev server only.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    map: HashMap<String, String>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashStore for MemoryHashStore {
    fn load(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    fn save(&mut self, key: &str, hash: &str) {
        debug!(key = %key, hash = %hash, "stored watch hash");
        self.map.insert(key.to_string(), hash.to_string());
    }
}
