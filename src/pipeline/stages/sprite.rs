// src/pipeline/stages/sprite.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::StageError;
use crate::pipeline::stages::is_ext;
use crate::pipeline::svg::{self, Element, Node};
use crate::pipeline::{FileSet, SourceFile, Stage, StageContext};
use crate::types::StageKind;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Merges every icon into one hidden sprite of `<symbol>` elements.
pub struct SpriteStage {
    ctx: Arc<StageContext>,
}

impl SpriteStage {
    pub fn new(ctx: Arc<StageContext>) -> Self {
        Self { ctx }
    }
}

fn symbol_for(file: &SourceFile, id: &str) -> Result<(Element, Vec<Node>), StageError> {
    let mut root = svg::parse(file.text()?)
        .map_err(|e| StageError::transform("sprite", file.display_name(), e))?;
    svg::minify(&mut root);
    svg::prefix_ids(&mut root, id);

    let mut symbol = Element::new("symbol");
    symbol.set_attr("id", id);
    if let Some(view_box) = root.view_box() {
        symbol.set_attr("viewBox", view_box);
    }

    let mut defs = Vec::new();
    for child in root.children {
        match child {
            Node::Element(el) if el.name == "defs" => defs.extend(el.children),
            other => symbol.children.push(other),
        }
    }
    Ok((symbol, defs))
}

impl Stage for SpriteStage {
    fn kind(&self) -> StageKind {
        StageKind::Sprite
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, StageError> {
        let (icons, rest): (Vec<SourceFile>, Vec<SourceFile>) =
            files.into_iter().partition(|f| is_ext(f, "svg"));
        if icons.is_empty() {
            return Ok(FileSet::new(rest));
        }

        let mut seen = HashSet::new();
        let mut defs = Vec::new();
        let mut symbols = Vec::new();
        for icon in &icons {
            let id = Path::new(&icon.file_name())
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !seen.insert(id.clone()) {
                return Err(StageError::transform(
                    "sprite",
                    icon.display_name(),
                    format!("duplicate icon name '{id}'"),
                ));
            }
            let (symbol, icon_defs) = symbol_for(icon, &id)?;
            defs.extend(icon_defs);
            symbols.push(Node::Element(symbol));
        }

        let mut sprite = Element::new("svg");
        sprite.set_attr("xmlns", SVG_NS);
        sprite.set_attr("style", "display:none");
        if !defs.is_empty() {
            let mut defs_el = Element::new("defs");
            defs_el.children = defs;
            sprite.children.push(Node::Element(defs_el));
        }
        sprite.children.extend(symbols);
        if svg::uses_xlink(&sprite) {
            sprite.set_attr("xmlns:xlink", XLINK_NS);
        }

        debug!(icons = icons.len(), sprite = %self.ctx.asset.sprite, "assembled sprite");
        let mut out = vec![SourceFile {
            path: PathBuf::from(&self.ctx.asset.sprite),
            contents: svg::to_string(&sprite).into_bytes(),
            origins: Vec::new(),
            map: None,
        }];
        out.extend(rest);
        Ok(FileSet::new(out))
    }
}
