// src/pipeline/stages/mod.rs

//! One module per [`StageKind`]. Every stage works on the files whose
//! extension it understands and passes the rest through untouched.

use std::sync::Arc;

use crate::pipeline::{Origin, SourceFile, Stage, StageContext, line_count};
use crate::types::StageKind;

pub mod banner;
pub mod compile;
pub mod concat;
pub mod lint;
pub mod minify;
pub mod optimize;
pub mod prefix;
pub mod rename;
pub mod sourcemap;
pub mod sprite;

pub use banner::{render_banner, BannerStage};
pub use compile::CompileStage;
pub use concat::ConcatStage;
pub use lint::LintStage;
pub use minify::MinifyStage;
pub use optimize::{strip_jpeg_metadata, OptimizeStage};
pub use prefix::PrefixStage;
pub use rename::{insert_suffix, RenameStage};
pub use sourcemap::SourceMapStage;
pub use sprite::SpriteStage;

pub fn build(kind: StageKind, ctx: &Arc<StageContext>) -> Box<dyn Stage> {
    let ctx = Arc::clone(ctx);
    match kind {
        StageKind::Lint => Box::new(LintStage::new(ctx)),
        StageKind::Compile => Box::new(CompileStage::new(ctx)),
        StageKind::Concat => Box::new(ConcatStage::new(ctx)),
        StageKind::Prefix => Box::new(PrefixStage::new(ctx)),
        StageKind::Minify => Box::new(MinifyStage::new(ctx)),
        StageKind::SourceMap => Box::new(SourceMapStage::new(ctx)),
        StageKind::Banner => Box::new(BannerStage::new(ctx)),
        StageKind::Rename => Box::new(RenameStage::new(ctx)),
        StageKind::Sprite => Box::new(SpriteStage::new(ctx)),
        StageKind::Optimize => Box::new(OptimizeStage),
    }
}

/// After a rewrite that does not preserve lines, a single-source file keeps
/// one origin spanning the new contents; a merged file loses its origins.
pub(crate) fn reset_origins(file: &mut SourceFile) {
    let source = file.source_path().map(str::to_string);
    file.origins = match source {
        Some(source) => vec![Origin {
            source,
            start_line: 0,
            line_count: line_count(&file.contents),
            source_line: 0,
        }],
        None => Vec::new(),
    };
}

pub(crate) fn is_ext(file: &SourceFile, ext: &str) -> bool {
    file.extension().as_deref() == Some(ext)
}
