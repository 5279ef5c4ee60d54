// src/watch/path_utils.rs

use std::path::Path;

/// `path` relative to `root` with forward slashes.
///
/// Falls back to comparing canonicalized paths, since notify may report a
/// different absolute prefix for the same directory (symlinks, macOS
/// `/private/var`).
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            let root = root.canonicalize().ok()?;
            let path = path.canonicalize().ok()?;
            path.strip_prefix(&root).ok()?.to_path_buf()
        }
    };
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Temporary files editors write next to the real one while saving.
pub fn is_editor_artifact(rel: &str) -> bool {
    let name = rel.rsplit('/').next().unwrap_or(rel);
    name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".swx")
        || name.starts_with(".#")
        || name == "4913"
}
