// src/pipeline/stages/banner.rs

use std::sync::Arc;

use crate::config::model::ProjectMetadata;
use crate::errors::StageError;
use crate::pipeline::stages::is_ext;
use crate::pipeline::{FileSet, Stage, StageContext};
use crate::types::StageKind;

pub fn render_banner(meta: &ProjectMetadata, year: i32) -> String {
    format!(
        "/*!\n * {}\n * {}\n * {}\n * @author {}\n * @version {}\n * Copyright {}. {} licensed.\n */\n",
        meta.name, meta.title, meta.url, meta.author, meta.version, year, meta.license
    )
}

/// Prepends the license banner to stylesheets and scripts.
pub struct BannerStage {
    ctx: Arc<StageContext>,
}

impl BannerStage {
    pub fn new(ctx: Arc<StageContext>) -> Self {
        Self { ctx }
    }
}

impl Stage for BannerStage {
    fn kind(&self) -> StageKind {
        StageKind::Banner
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, StageError> {
        let banner = render_banner(&self.ctx.metadata, self.ctx.year);
        let lines = banner.matches('\n').count();

        files.try_map(|mut file| {
            if !(is_ext(&file, "css") || is_ext(&file, "js")) {
                return Ok(file);
            }
            let mut contents = banner.clone().into_bytes();
            contents.extend_from_slice(&file.contents);
            file.contents = contents;
            for origin in &mut file.origins {
                origin.start_line += lines;
            }
            let display = file.display_name();
            if let Some(map) = &mut file.map {
                map.offset_lines(0, lines as i64)
                    .map_err(|e| StageError::transform("banner", display, e.to_string()))?;
            }
            Ok(file)
        })
    }
}
