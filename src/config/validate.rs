// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::Path;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{
    encode_browser_version, AssetConfig, BrowserTargets, ConfigFile, ProjectMetadata,
    RawAssetConfig, RawConfigFile, ServerConfig, TaskConfig, TaskSpec, KNOWN_BROWSERS,
};
use crate::config::resolver::{compile_glob, literal_base, paths_overlap};
use crate::errors::{AssetflowError, Result};
use crate::types::{AssetClass, StageKind};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_global_config(&raw)?;

        let assets = build_assets(&raw)?;
        let tasks = build_tasks(&raw, &assets)?;
        validate_task_dependencies(&tasks)?;
        validate_dag(&tasks)?;

        let browsers = build_browsers(&raw.browsers)?;
        let server = build_server(&raw)?;
        let metadata = metadata_from_package(&raw);

        Ok(ConfigFile::new_unchecked(
            raw.config,
            raw.project,
            metadata,
            server,
            browsers,
            assets,
            tasks,
        ))
    }
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(AssetflowError::config(
            "[config].queue_length must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

fn build_assets(raw: &RawConfigFile) -> Result<BTreeMap<AssetClass, AssetConfig>> {
    for key in raw.assets.keys() {
        key.parse::<AssetClass>()
            .map_err(|e| AssetflowError::config(format!("[assets.{key}]: {e}")))?;
    }

    let mut assets = BTreeMap::new();
    for class in AssetClass::ALL {
        let mut asset = AssetConfig::default_for(class, &raw.project.src, &raw.project.dist);
        if let Some(over) = raw.assets.get(class.as_str()) {
            apply_override(&mut asset, over)?;
        }
        validate_asset(&asset)?;
        assets.insert(class, asset);
    }
    Ok(assets)
}

fn apply_override(asset: &mut AssetConfig, over: &RawAssetConfig) -> Result<()> {
    if let Some(src) = &over.src {
        asset.src = src.clone();
        // Watch globs follow the sources unless given explicitly.
        if over.watch.is_none() {
            asset.watch = src.clone();
        }
    }
    if let Some(dest) = &over.dest {
        asset.dest = dest.clone();
    }
    if let Some(watch) = &over.watch {
        asset.watch = watch.clone();
    }
    asset.exclude = over.exclude.clone();
    if let Some(stages) = &over.stages {
        asset.stages = parse_stages(stages, &format!("[assets.{}]", asset.class))?;
    }
    if let Some(concat) = &over.concat {
        asset.concat = concat.clone();
    }
    if let Some(suffix) = &over.suffix {
        asset.suffix = suffix.clone();
    }
    if let Some(sprite) = &over.sprite {
        asset.sprite = sprite.clone();
    }
    Ok(())
}

fn parse_stages(names: &[String], context: &str) -> Result<Vec<StageKind>> {
    names
        .iter()
        .map(|n| {
            n.parse::<StageKind>()
                .map_err(|e| AssetflowError::config(format!("{context}: {e}")))
        })
        .collect()
}

fn validate_asset(asset: &AssetConfig) -> Result<()> {
    let class = asset.class;

    if asset.src.is_empty() {
        return Err(AssetflowError::config(format!(
            "[assets.{class}].src must list at least one glob"
        )));
    }

    for pattern in asset.src.iter().chain(&asset.watch).chain(&asset.exclude) {
        compile_glob(pattern)
            .map_err(|e| AssetflowError::config(format!("[assets.{class}]: {e:#}")))?;
    }

    // Output landing under a watched directory would retrigger its own task.
    let dest = Path::new(&asset.dest);
    for (key, patterns) in [("src", &asset.src), ("watch", &asset.watch)] {
        for pattern in patterns {
            let base = literal_base(pattern);
            if paths_overlap(&base, dest) {
                return Err(AssetflowError::config(format!(
                    "[assets.{class}].{key}: destination '{}' overlaps directory '{}' of '{pattern}'",
                    asset.dest,
                    base.display()
                )));
            }
        }
    }

    for stage in &asset.stages {
        if !stage.supports(class) {
            return Err(AssetflowError::config(format!(
                "[assets.{class}]: stage '{stage}' is not supported for {class}"
            )));
        }
    }

    Ok(())
}

/// Tasks used when the file declares no `[task.*]` at all.
fn default_tasks() -> BTreeMap<String, TaskConfig> {
    let mut tasks = BTreeMap::new();
    for (name, class) in [
        ("css", AssetClass::Styles),
        ("js", AssetClass::Scripts),
        ("images", AssetClass::Images),
        ("svg-sprite", AssetClass::Icons),
    ] {
        tasks.insert(
            name.to_string(),
            TaskConfig {
                asset: Some(class.as_str().to_string()),
                ..TaskConfig::default()
            },
        );
    }
    tasks.insert(
        "build".to_string(),
        TaskConfig {
            after: ["css", "js", "images", "svg-sprite"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..TaskConfig::default()
        },
    );
    tasks
}

fn build_tasks(
    raw: &RawConfigFile,
    assets: &BTreeMap<AssetClass, AssetConfig>,
) -> Result<BTreeMap<String, TaskSpec>> {
    let raw_tasks = if raw.task.is_empty() {
        default_tasks()
    } else {
        raw.task.clone()
    };

    let mut tasks = BTreeMap::new();
    for (name, task) in raw_tasks {
        let context = format!("[task.{name}]");
        let asset = match &task.asset {
            Some(a) => Some(
                a.parse::<AssetClass>()
                    .map_err(|e| AssetflowError::config(format!("{context}: {e}")))?,
            ),
            None => None,
        };

        let stages = match (asset, &task.stages) {
            (None, Some(_)) => {
                return Err(AssetflowError::config(format!(
                    "{context}: `stages` requires `asset`"
                )));
            }
            (None, None) => Vec::new(),
            (Some(class), None) => assets[&class].stages.clone(),
            (Some(class), Some(names)) => {
                let wanted = parse_stages(names, &context)?;
                ensure_ordered_subset(&wanted, &assets[&class].stages).map_err(|stage| {
                    AssetflowError::config(format!(
                        "{context}: stage '{stage}' is not in the {class} pipeline or out of order"
                    ))
                })?;
                wanted
            }
        };

        let spec = TaskSpec {
            watch: task.watch.unwrap_or(asset.is_some()),
            use_hash: task.use_hash.unwrap_or(raw.config.use_hash),
            name: name.clone(),
            asset,
            stages,
            after: task.after,
        };
        tasks.insert(name, spec);
    }
    Ok(tasks)
}

/// `Err(stage)` names the first stage that breaks the subsequence.
pub(crate) fn ensure_ordered_subset(
    wanted: &[StageKind],
    pipeline: &[StageKind],
) -> std::result::Result<(), StageKind> {
    let mut rest = pipeline.iter();
    for stage in wanted {
        if !rest.any(|s| s == stage) {
            return Err(*stage);
        }
    }
    Ok(())
}

fn validate_task_dependencies(tasks: &BTreeMap<String, TaskSpec>) -> Result<()> {
    for (name, task) in tasks {
        for dep in &task.after {
            if dep == name {
                return Err(AssetflowError::config(format!(
                    "task '{name}' cannot depend on itself in `after`"
                )));
            }
            if !tasks.contains_key(dep) {
                return Err(AssetflowError::config(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(tasks: &BTreeMap<String, TaskSpec>) -> Result<()> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in tasks.keys() {
        graph.add_node(name.as_str());
    }
    for (name, task) in tasks {
        for dep in &task.after {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_) => Ok(()),
        Err(cycle) => Err(AssetflowError::DagCycle(format!(
            "cycle detected in task DAG involving task '{}'",
            cycle.node_id()
        ))),
    }
}

fn build_browsers(raw: &BTreeMap<String, String>) -> Result<BrowserTargets> {
    if raw.is_empty() {
        return Ok(BrowserTargets::classic());
    }

    let mut entries = BTreeMap::new();
    for (browser, version) in raw {
        if !KNOWN_BROWSERS.contains(&browser.as_str()) {
            return Err(AssetflowError::config(format!(
                "[browsers]: unknown browser '{browser}' (expected one of {})",
                KNOWN_BROWSERS.join(", ")
            )));
        }
        let encoded = encode_browser_version(version).ok_or_else(|| {
            AssetflowError::config(format!(
                "[browsers]: invalid version '{version}' for {browser}"
            ))
        })?;
        entries.insert(browser.clone(), encoded);
    }
    Ok(BrowserTargets::from_entries(entries))
}

fn build_server(raw: &RawConfigFile) -> Result<ServerConfig> {
    let server = &raw.server;
    let reload_on = server
        .reload_on
        .clone()
        .unwrap_or_else(|| vec![format!("{}/*.html", raw.project.dist)]);
    for pattern in &reload_on {
        compile_glob(pattern)
            .map_err(|e| AssetflowError::config(format!("[server].reload_on: {e:#}")))?;
    }

    Ok(ServerConfig {
        host: server.host.clone(),
        port: server.port,
        root: server
            .root
            .clone()
            .unwrap_or_else(|| raw.project.dist.clone()),
        reload_on,
    })
}

fn metadata_from_package(raw: &RawConfigFile) -> ProjectMetadata {
    let pkg = &raw.package;
    ProjectMetadata {
        name: pkg.name.clone().unwrap_or_default(),
        title: pkg.title.clone().unwrap_or_default(),
        url: pkg
            .url
            .clone()
            .or_else(|| pkg.homepage.clone())
            .unwrap_or_default(),
        author: pkg
            .author
            .as_ref()
            .map(|a| a.name().to_string())
            .unwrap_or_default(),
        version: pkg.version.clone().unwrap_or_default(),
        license: pkg.license.clone().unwrap_or_default(),
    }
}
