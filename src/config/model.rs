// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{AssetClass, StageKind, TriggerWhileRunningBehaviour};

/// Top-level configuration exactly as read from `Assetflow.toml`.
///
/// ```toml
/// [config]
/// triggered_while_running_behaviour = "queue"
/// queue_length = 1
///
/// [project]
/// src = "src"
/// dist = "dist"
///
/// [package]
/// package_json = "package.json"
///
/// [assets.styles]
/// src = ["src/css/*.css"]
/// dest = "dist/assets/css"
///
/// [task.css]
/// asset = "styles"
/// ```
///
/// Every section is optional. Class and stage names stay strings here so
/// that unknown names surface as configuration errors during validation
/// instead of opaque TOML errors.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub package: PackageSection,

    #[serde(default)]
    pub server: ServerSection,

    /// Browser matrix used by the CSS compiler, e.g. `chrome = "80"`.
    #[serde(default)]
    pub browsers: BTreeMap<String, String>,

    /// `[assets.<class>]` overrides keyed by class name.
    #[serde(default)]
    pub assets: BTreeMap<String, RawAssetConfig>,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Maximum number of queued follow-up runs to remember.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// Default for `[task.<name>].use_hash`.
    #[serde(default)]
    pub use_hash: bool,
}

fn default_queue_length() -> usize {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: default_queue_length(),
            use_hash: false,
        }
    }
}

/// `[project]` section: the two roots every default path hangs off.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    #[serde(default = "default_src")]
    pub src: String,
    #[serde(default = "default_dist")]
    pub dist: String,
}

fn default_src() -> String {
    "src".to_string()
}

fn default_dist() -> String {
    "dist".to_string()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            src: default_src(),
            dist: default_dist(),
        }
    }
}

/// `[package]` section. Inline keys win over values read from `package_json`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PackageSection {
    pub name: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub homepage: Option<String>,
    pub author: Option<AuthorField>,
    pub version: Option<String>,
    pub license: Option<String>,

    /// Path (relative to the config file) of an npm-style manifest to read
    /// missing metadata from.
    pub package_json: Option<String>,
}

/// `author` is either a plain string or a table with a `name` key.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AuthorField {
    Name(String),
    Person { name: String },
}

impl AuthorField {
    pub fn name(&self) -> &str {
        match self {
            AuthorField::Name(n) => n,
            AuthorField::Person { name } => name,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served over HTTP; defaults to `project.dist`.
    #[serde(default)]
    pub root: Option<String>,

    /// Globs whose changes only trigger a browser reload.
    /// Defaults to `<dist>/*.html`.
    #[serde(default)]
    pub reload_on: Option<Vec<String>>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            root: None,
            reload_on: None,
        }
    }
}

/// `[assets.<class>]` section; every key falls back to the class default.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAssetConfig {
    pub src: Option<Vec<String>>,
    pub dest: Option<String>,
    pub watch: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub stages: Option<Vec<String>>,
    pub concat: Option<String>,
    pub suffix: Option<String>,
    pub sprite: Option<String>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Asset class this task builds. Tasks without one are aggregates.
    #[serde(default)]
    pub asset: Option<String>,

    /// Ordered subset of the class pipeline; defaults to the whole pipeline.
    #[serde(default)]
    pub stages: Option<Vec<String>>,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Rebuild on changes to the class watch globs. Defaults to `true` for
    /// asset-bound tasks.
    #[serde(default)]
    pub watch: Option<bool>,

    /// Skip watch rebuilds when the changed file's content is unchanged.
    #[serde(default)]
    pub use_hash: Option<bool>,
}

/// Fully resolved settings of one asset class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetConfig {
    pub class: AssetClass,
    pub src: Vec<String>,
    pub dest: String,
    pub watch: Vec<String>,
    pub exclude: Vec<String>,
    pub stages: Vec<StageKind>,
    pub concat: String,
    pub suffix: String,
    pub sprite: String,
}

impl AssetConfig {
    /// Built-in layout for `class` below the given project roots.
    pub fn default_for(class: AssetClass, src: &str, dist: &str) -> Self {
        let (sources, dest, watch) = match class {
            AssetClass::Styles => (
                vec![format!("{src}/css/*.css")],
                format!("{dist}/assets/css"),
                vec![format!("{src}/css/**/*.css")],
            ),
            AssetClass::Scripts => {
                let globs = vec![format!("{src}/js/plugins/*.js"), format!("{src}/js/*.js")];
                (globs.clone(), format!("{dist}/assets/js"), globs)
            }
            AssetClass::Images => {
                let globs = vec![format!("{src}/img/**/*.{{jpg,jpeg,png,gif,svg}}")];
                (globs.clone(), format!("{dist}/assets/img"), globs)
            }
            AssetClass::Icons => {
                let globs = vec![format!("{src}/icons/**/*.svg")];
                (globs.clone(), format!("{dist}/assets/img"), globs)
            }
        };

        Self {
            class,
            src: sources,
            dest,
            watch,
            exclude: Vec::new(),
            stages: class.default_stages(),
            concat: "scripts.js".to_string(),
            suffix: ".min".to_string(),
            sprite: "icons.svg".to_string(),
        }
    }
}

/// A validated task definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    pub asset: Option<AssetClass>,
    pub stages: Vec<StageKind>,
    pub after: Vec<String>,
    pub watch: bool,
    pub use_hash: bool,
}

impl TaskSpec {
    pub fn is_aggregate(&self) -> bool {
        self.asset.is_none()
    }
}

/// Resolved `[server]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub root: String,
    pub reload_on: Vec<String>,
}

/// Browser matrix as `(browser, encoded version)` pairs.
///
/// Versions are encoded as `major << 16 | minor << 8 | patch`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BrowserTargets {
    entries: BTreeMap<String, u32>,
}

pub const KNOWN_BROWSERS: [&str; 9] = [
    "android", "chrome", "edge", "firefox", "ie", "ios_saf", "opera", "safari", "samsung",
];

impl BrowserTargets {
    pub fn from_entries(entries: BTreeMap<String, u32>) -> Self {
        Self { entries }
    }

    /// The matrix used when `[browsers]` is absent.
    pub fn classic() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("chrome".to_string(), 80 << 16);
        entries.insert("edge".to_string(), 88 << 16);
        entries.insert("firefox".to_string(), 78 << 16);
        entries.insert("safari".to_string(), 13 << 16);
        entries.insert("ios_saf".to_string(), 13 << 16);
        Self { entries }
    }

    pub fn get(&self, browser: &str) -> Option<u32> {
        self.entries.get(browser).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse `"13"`, `"13.1"` or `"13.1.2"` into the encoded form.
pub fn encode_browser_version(raw: &str) -> Option<u32> {
    let mut parts = raw.trim().split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    let patch: u32 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || major > 0xffff || minor > 0xff || patch > 0xff {
        return None;
    }
    Some((major << 16) | (minor << 8) | patch)
}

/// Metadata consumed by the banner stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectMetadata {
    pub name: String,
    pub title: String,
    pub url: String,
    pub author: String,
    pub version: String,
    pub license: String,
}

/// Validated configuration.
///
/// Construct it through `ConfigFile::try_from(RawConfigFile)` (see
/// `validate.rs`) or the loader; it is immutable afterwards.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    project: ProjectSection,
    metadata: ProjectMetadata,
    server: ServerConfig,
    browsers: BrowserTargets,
    assets: BTreeMap<AssetClass, AssetConfig>,
    tasks: BTreeMap<String, TaskSpec>,
}

impl ConfigFile {
    /// Assemble a config without running validation.
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        project: ProjectSection,
        metadata: ProjectMetadata,
        server: ServerConfig,
        browsers: BrowserTargets,
        assets: BTreeMap<AssetClass, AssetConfig>,
        tasks: BTreeMap<String, TaskSpec>,
    ) -> Self {
        Self {
            config,
            project,
            metadata,
            server,
            browsers,
            assets,
            tasks,
        }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn project(&self) -> &ProjectSection {
        &self.project
    }

    pub fn metadata(&self) -> &ProjectMetadata {
        &self.metadata
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn browsers(&self) -> &BrowserTargets {
        &self.browsers
    }

    pub fn asset(&self, class: AssetClass) -> &AssetConfig {
        // Every class is populated during validation.
        &self.assets[&class]
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetConfig> {
        self.assets.values()
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskSpec> {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.get(name)
    }
}
