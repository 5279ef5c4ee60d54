// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML-backed raw model and the validated `ConfigFile`.
//! - `loader.rs`: reading the file and merging `package.json` metadata.
//! - `validate.rs`: defaults, glob and stage checks, DAG correctness.
//! - `resolver.rs`: per-class source globs and destination directory.

pub mod loader;
pub mod metadata;
pub mod model;
pub mod resolver;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    AssetConfig, BrowserTargets, ConfigFile, ConfigSection, ProjectMetadata, RawConfigFile,
    ServerConfig, TaskConfig, TaskSpec,
};
pub use resolver::{resolve, resolve_named, ResolvedPaths};
