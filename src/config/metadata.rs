// src/config/metadata.rs

//! Banner metadata from an npm-style `package.json`.

use serde::Deserialize;

use crate::config::model::{AuthorField, PackageSection};
use crate::errors::{AssetflowError, Result};

#[derive(Debug, Deserialize, Default)]
struct PackageJson {
    name: Option<String>,
    title: Option<String>,
    homepage: Option<String>,
    url: Option<String>,
    author: Option<AuthorField>,
    version: Option<String>,
    license: Option<String>,
}

/// Fill every key of `package` that is still unset from `json`.
pub fn merge_package_json(package: &mut PackageSection, json: &str) -> Result<()> {
    let parsed: PackageJson = serde_json::from_str(json)
        .map_err(|e| AssetflowError::config(format!("invalid package.json: {e}")))?;

    fill(&mut package.name, parsed.name);
    fill(&mut package.title, parsed.title);
    fill(&mut package.url, parsed.url);
    fill(&mut package.homepage, parsed.homepage);
    fill(&mut package.author, parsed.author);
    fill(&mut package.version, parsed.version);
    fill(&mut package.license, parsed.license);
    Ok(())
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}
