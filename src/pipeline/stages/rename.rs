// src/pipeline/stages/rename.rs

use std::sync::Arc;

use crate::errors::StageError;
use crate::pipeline::{FileSet, Stage, StageContext};
use crate::types::StageKind;

/// `app.css` + `.min` → `app.min.css`; a name without an extension gets the
/// suffix appended.
pub fn insert_suffix(file_name: &str, suffix: &str) -> String {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => {
            format!("{}{}{}", &file_name[..dot], suffix, &file_name[dot..])
        }
        _ => format!("{file_name}{suffix}"),
    }
}

pub struct RenameStage {
    ctx: Arc<StageContext>,
}

impl RenameStage {
    pub fn new(ctx: Arc<StageContext>) -> Self {
        Self { ctx }
    }
}

impl Stage for RenameStage {
    fn kind(&self) -> StageKind {
        StageKind::Rename
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, StageError> {
        let suffix = &self.ctx.asset.suffix;
        files.try_map(|mut file| {
            let renamed = insert_suffix(&file.file_name(), suffix);
            file.path.set_file_name(renamed);
            Ok(file)
        })
    }
}
