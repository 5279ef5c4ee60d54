#![allow(dead_code)]

use assetflow::config::model::{PackageSection, RawAssetConfig};
use assetflow::config::{ConfigFile, RawConfigFile, TaskConfig};
use assetflow::errors::Result;
use assetflow::types::{AssetClass, TriggerWhileRunningBehaviour};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from an empty raw config, so without `with_task` the built-in task
/// set (css, js, images, svg-sprite, build) applies.
#[derive(Debug, Default)]
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_asset(mut self, class: AssetClass, asset: RawAssetConfig) -> Self {
        self.config.assets.insert(class.as_str().to_string(), asset);
        self
    }

    pub fn with_project(mut self, src: &str, dist: &str) -> Self {
        self.config.project.src = src.to_string();
        self.config.project.dist = dist.to_string();
        self
    }

    pub fn with_behaviour(mut self, behaviour: TriggerWhileRunningBehaviour) -> Self {
        self.config.config.triggered_while_running_behaviour = behaviour;
        self
    }

    pub fn with_queue_length(mut self, len: usize) -> Self {
        self.config.config.queue_length = len;
        self
    }

    pub fn with_default_use_hash(mut self, val: bool) -> Self {
        self.config.config.use_hash = val;
        self
    }

    pub fn with_browser(mut self, browser: &str, version: &str) -> Self {
        self.config
            .browsers
            .insert(browser.to_string(), version.to_string());
        self
    }

    pub fn with_package(mut self, package: PackageSection) -> Self {
        self.config.package = package;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

/// Builder for `TaskConfig`.
#[derive(Debug, Default)]
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// A task building `class` with its full pipeline.
    pub fn asset(class: AssetClass) -> Self {
        Self {
            task: TaskConfig {
                asset: Some(class.as_str().to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// A task without an asset class.
    pub fn aggregate() -> Self {
        Self::default()
    }

    pub fn stages(mut self, stages: &[&str]) -> Self {
        self.task.stages = Some(stages.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn watch(mut self, val: bool) -> Self {
        self.task.watch = Some(val);
        self
    }

    pub fn use_hash(mut self, val: bool) -> Self {
        self.task.use_hash = Some(val);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// `[assets.<class>]` override with only `src` and `dest` set.
pub fn asset_paths(src: &[&str], dest: &str) -> RawAssetConfig {
    RawAssetConfig {
        src: Some(src.iter().map(|s| s.to_string()).collect()),
        dest: Some(dest.to_string()),
        ..RawAssetConfig::default()
    }
}
