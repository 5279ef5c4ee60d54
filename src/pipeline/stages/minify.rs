// src/pipeline/stages/minify.rs

use std::sync::Arc;

use crate::errors::StageError;
use crate::pipeline::sourcemap::{self, OriginalLocation};
use crate::pipeline::stages::is_ext;
use crate::pipeline::{css, js, svg, FileSet, SourceFile, Stage, StageContext};
use crate::types::StageKind;

/// Whitespace and comment removal for stylesheets, scripts and SVG.
/// Stylesheets and scripts come out with a source map.
pub struct MinifyStage {
    ctx: Arc<StageContext>,
}

impl MinifyStage {
    pub fn new(ctx: Arc<StageContext>) -> Self {
        Self { ctx }
    }

    fn minify_css(&self, mut file: SourceFile) -> Result<SourceFile, StageError> {
        let printed = css::minify(
            file.text()?,
            &file.display_name(),
            css::targets(&self.ctx.browsers),
        )?;
        file.rewrite(printed.code, &printed.map);
        Ok(file)
    }

    fn minify_js(&self, mut file: SourceFile) -> Result<SourceFile, StageError> {
        let minified = js::minify(file.text()?).map_err(|e| {
            StageError::transform("minify", file.display_name(), e.to_string())
        })?;

        let mut step = sourcemap::new_map();
        let source = step.add_source(&file.display_name());
        for (out_line, out_col, in_line, in_col) in minified.positions {
            step.add_mapping(
                out_line as u32,
                out_col as u32,
                Some(OriginalLocation::new(in_line as u32, in_col as u32, source, None)),
            );
        }
        file.rewrite(minified.code, &step);
        Ok(file)
    }
}

pub(crate) fn minify_svg(file: &SourceFile, stage: &'static str) -> Result<String, StageError> {
    let mut root = svg::parse(file.text()?)
        .map_err(|e| StageError::transform(stage, file.display_name(), e))?;
    svg::minify(&mut root);
    Ok(svg::to_string(&root))
}

impl Stage for MinifyStage {
    fn kind(&self) -> StageKind {
        StageKind::Minify
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, StageError> {
        files.try_map(|mut file| {
            if is_ext(&file, "css") {
                self.minify_css(file)
            } else if is_ext(&file, "js") {
                self.minify_js(file)
            } else if is_ext(&file, "svg") {
                let out = minify_svg(&file, "minify")?;
                file.set_text(out);
                Ok(file)
            } else {
                Ok(file)
            }
        })
    }
}
