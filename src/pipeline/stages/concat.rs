// src/pipeline/stages/concat.rs

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::StageError;
use crate::pipeline::{extension_of, line_count, FileSet, Origin, SourceFile, Stage, StageContext};
use crate::types::StageKind;

/// Joins every file sharing the extension of the configured output name
/// into that one file, separated by `\n`, in input order.
pub struct ConcatStage {
    ctx: Arc<StageContext>,
}

impl ConcatStage {
    pub fn new(ctx: Arc<StageContext>) -> Self {
        Self { ctx }
    }
}

impl Stage for ConcatStage {
    fn kind(&self) -> StageKind {
        StageKind::Concat
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, StageError> {
        let name = PathBuf::from(&self.ctx.asset.concat);
        let ext = extension_of(&name);

        let (joined, rest): (Vec<SourceFile>, Vec<SourceFile>) = files
            .into_iter()
            .partition(|f| f.extension().is_some() && f.extension() == ext);

        if joined.is_empty() {
            return Ok(FileSet::new(rest));
        }

        let mut contents = Vec::new();
        let mut origins = Vec::new();
        let mut offset = 0usize;
        for (i, file) in joined.into_iter().enumerate() {
            if i > 0 {
                contents.push(b'\n');
            }
            for o in &file.origins {
                origins.push(Origin {
                    start_line: o.start_line + offset,
                    ..o.clone()
                });
            }
            offset += line_count(&file.contents);
            contents.extend_from_slice(&file.contents);
        }

        let mut out = vec![SourceFile {
            path: name,
            contents,
            origins,
            map: None,
        }];
        out.extend(rest);
        Ok(FileSet::new(out))
    }
}
