// src/pipeline/stages/sourcemap.rs

use std::sync::Arc;

use tracing::debug;

use crate::errors::StageError;
use crate::pipeline::sourcemap::{self, SourceMap};
use crate::pipeline::stages::is_ext;
use crate::pipeline::{FileSet, SourceFile, Stage, StageContext};
use crate::types::StageKind;

/// Writes `<name>.map` next to every stylesheet and script and links it
/// with a `sourceMappingURL` comment.
///
/// Files that reach this stage without a map get a line-level one built
/// from their origins. Sources readable below the project root are
/// embedded as `sourcesContent`.
pub struct SourceMapStage {
    ctx: Arc<StageContext>,
}

impl SourceMapStage {
    pub fn new(ctx: Arc<StageContext>) -> Self {
        Self { ctx }
    }

    fn embed_sources(&self, map: &mut SourceMap) {
        let sources = map.get_sources().clone();
        for (index, source) in sources.iter().enumerate() {
            match self.ctx.fs.read_to_string(&self.ctx.root.join(source)) {
                Ok(content) => {
                    // Index comes from the map's own source list.
                    let _ = map.set_source_content(index, &content);
                }
                Err(err) => debug!(%source, error = %err, "source not embedded in map"),
            }
        }
    }
}

impl Stage for SourceMapStage {
    fn kind(&self) -> StageKind {
        StageKind::SourceMap
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, StageError> {
        let mut out = Vec::with_capacity(files.len() * 2);
        for mut file in files {
            let comment = if is_ext(&file, "css") {
                "/*# sourceMappingURL={} */"
            } else if is_ext(&file, "js") {
                "//# sourceMappingURL={}"
            } else {
                out.push(file);
                continue;
            };

            let mut map = file
                .map
                .take()
                .unwrap_or_else(|| sourcemap::line_map(&file.origins));
            self.embed_sources(&mut map);
            let name = file.file_name();
            let map_name = format!("{name}.map");
            let json = sourcemap::to_json(&mut map, &name).map_err(|e| {
                StageError::transform("sourcemap", file.display_name(), e.to_string())
            })?;

            if !file.contents.ends_with(b"\n") {
                file.contents.push(b'\n');
            }
            file.contents
                .extend_from_slice(comment.replace("{}", &map_name).as_bytes());

            let map_file = SourceFile {
                path: file.path.with_file_name(&map_name),
                contents: json.into_bytes(),
                origins: Vec::new(),
                map: None,
            };
            out.push(file);
            out.push(map_file);
        }
        Ok(FileSet::new(out))
    }
}
