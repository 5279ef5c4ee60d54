use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Behaviour when a task is triggered again while it is part of the active run.
///
/// - `Queue`: remember the trigger and start a follow-up run when the current
///   one finishes. Repeated triggers coalesce into the same follow-up run.
/// - `Cancel`: drop any previously queued batches and keep only the latest
///   trigger. The running rebuild itself is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Cancel,
}

impl FromStr for TriggerWhileRunningBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(TriggerWhileRunningBehaviour::Queue),
            "cancel" => Ok(TriggerWhileRunningBehaviour::Cancel),
            other => Err(format!(
                "invalid triggered_while_running_behaviour: {other} (expected \"queue\" or \"cancel\")"
            )),
        }
    }
}

/// A category of source files sharing one build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetClass {
    Styles,
    Scripts,
    Images,
    Icons,
}

impl AssetClass {
    pub const ALL: [AssetClass; 4] = [
        AssetClass::Styles,
        AssetClass::Scripts,
        AssetClass::Images,
        AssetClass::Icons,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetClass::Styles => "styles",
            AssetClass::Scripts => "scripts",
            AssetClass::Images => "images",
            AssetClass::Icons => "icons",
        }
    }

    /// Pipeline used when `[assets.<class>].stages` is not given.
    pub fn default_stages(self) -> Vec<StageKind> {
        use StageKind::*;
        match self {
            AssetClass::Styles => vec![Lint, Compile, Prefix, Minify, Banner, Rename, SourceMap],
            AssetClass::Scripts => {
                vec![Lint, Concat, Compile, Minify, Banner, Rename, SourceMap]
            }
            AssetClass::Images => vec![Optimize],
            AssetClass::Icons => vec![Sprite],
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "styles" => Ok(AssetClass::Styles),
            "scripts" => Ok(AssetClass::Scripts),
            "images" => Ok(AssetClass::Images),
            "icons" => Ok(AssetClass::Icons),
            other => Err(format!(
                "unknown asset class: {other} (expected styles, scripts, images or icons)"
            )),
        }
    }
}

/// Identifier of one transform stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Lint,
    Compile,
    Concat,
    Prefix,
    Minify,
    SourceMap,
    Banner,
    Rename,
    Sprite,
    Optimize,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Lint => "lint",
            StageKind::Compile => "compile",
            StageKind::Concat => "concat",
            StageKind::Prefix => "prefix",
            StageKind::Minify => "minify",
            StageKind::SourceMap => "sourcemap",
            StageKind::Banner => "banner",
            StageKind::Rename => "rename",
            StageKind::Sprite => "sprite",
            StageKind::Optimize => "optimize",
        }
    }

    /// Whether this stage may appear in the pipeline of `class`.
    pub fn supports(self, class: AssetClass) -> bool {
        use AssetClass::*;
        match self {
            StageKind::Lint | StageKind::Compile | StageKind::Minify | StageKind::Concat => {
                matches!(class, Styles | Scripts)
            }
            StageKind::Prefix => class == Styles,
            StageKind::SourceMap | StageKind::Banner => matches!(class, Styles | Scripts),
            StageKind::Rename => true,
            StageKind::Sprite => class == Icons,
            StageKind::Optimize => matches!(class, Images | Icons),
        }
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lint" => Ok(StageKind::Lint),
            "compile" => Ok(StageKind::Compile),
            "concat" => Ok(StageKind::Concat),
            "prefix" => Ok(StageKind::Prefix),
            "minify" => Ok(StageKind::Minify),
            "sourcemap" | "source-map" => Ok(StageKind::SourceMap),
            "banner" => Ok(StageKind::Banner),
            "rename" => Ok(StageKind::Rename),
            "sprite" => Ok(StageKind::Sprite),
            "optimize" => Ok(StageKind::Optimize),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
