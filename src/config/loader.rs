// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::metadata::merge_package_json;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{AssetflowError, Result};

/// Load a configuration file and return the raw, unvalidated model.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load, merge `package_json` metadata and validate.
///
/// This is the entry point the CLI uses. `package_json` is resolved
/// relative to the directory holding the config file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw = load_from_path(path)?;

    if let Some(pkg_path) = raw.package.package_json.clone() {
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let full = base.join(&pkg_path);
        debug!(path = %full.display(), "reading package metadata");
        let json = fs::read_to_string(&full).map_err(|e| {
            AssetflowError::config(format!("cannot read {}: {e}", full.display()))
        })?;
        merge_package_json(&mut raw.package, &json)?;
    }

    ConfigFile::try_from(raw)
}

/// Location used when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Assetflow.toml")
}
