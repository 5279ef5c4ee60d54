// src/pipeline/stages/prefix.rs

use std::sync::Arc;

use crate::errors::StageError;
use crate::pipeline::stages::is_ext;
use crate::pipeline::{css, FileSet, Stage, StageContext};
use crate::types::StageKind;

/// Vendor prefixes for the configured browser matrix.
pub struct PrefixStage {
    ctx: Arc<StageContext>,
}

impl PrefixStage {
    pub fn new(ctx: Arc<StageContext>) -> Self {
        Self { ctx }
    }
}

impl Stage for PrefixStage {
    fn kind(&self) -> StageKind {
        StageKind::Prefix
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, StageError> {
        let targets = css::targets(&self.ctx.browsers);
        files.try_map(|mut file| {
            if !is_ext(&file, "css") {
                return Ok(file);
            }
            let printed = css::prefix(file.text()?, &file.display_name(), targets)?;
            file.rewrite(printed.code, &printed.map);
            Ok(file)
        })
    }
}
