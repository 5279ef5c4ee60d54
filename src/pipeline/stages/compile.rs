// src/pipeline/stages/compile.rs

use std::sync::Arc;

use crate::errors::StageError;
use crate::pipeline::sourcemap::{self, Prior};
use crate::pipeline::stages::{is_ext, reset_origins};
use crate::pipeline::{css, js, locate_in, FileSet, SourceFile, Stage, StageContext};
use crate::types::StageKind;

/// Stylesheets: inline partials, then parse and lower nesting.
/// Scripts: syntax check only; contents are left as they are.
pub struct CompileStage {
    ctx: Arc<StageContext>,
}

impl CompileStage {
    pub fn new(ctx: Arc<StageContext>) -> Self {
        Self { ctx }
    }

    fn compile_css(&self, mut file: SourceFile) -> Result<SourceFile, StageError> {
        let display = file.display_name();
        let on_disk = self.ctx.root.join(file.source_path().unwrap_or(&display));
        let text = file.text()?;
        let inlined = css::inline_imports(self.ctx.fs.as_ref(), &on_disk, &display, text)?;
        let printed = css::compile(&inlined.text, &display, css::targets(&self.ctx.browsers))
            .map_err(|err| match err {
                // Lines are in the inlined text; report them against the
                // file they came from.
                StageError::Compile { file: shown, line, message } => {
                    match locate_in(&inlined.origins, line.saturating_sub(1)) {
                        Some((source, src_line)) => StageError::Compile {
                            file: source.to_string(),
                            line: src_line + 1,
                            message,
                        },
                        None => StageError::Compile { file: shown, line, message },
                    }
                }
                other => other,
            })?;
        file.map = Some(sourcemap::compose(
            &printed.map,
            Prior::Origins(&inlined.origins),
        ));
        file.set_text(printed.code);
        reset_origins(&mut file);
        Ok(file)
    }

    fn check_js(&self, file: SourceFile) -> Result<SourceFile, StageError> {
        if let Err(err) = js::validate(file.text()?) {
            let (source, line) = match file.locate(err.line - 1) {
                Some((source, src_line)) => (source.to_string(), src_line + 1),
                None => (file.display_name(), err.line),
            };
            return Err(StageError::Compile {
                file: source,
                line,
                message: err.message,
            });
        }
        Ok(file)
    }
}

impl Stage for CompileStage {
    fn kind(&self) -> StageKind {
        StageKind::Compile
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, StageError> {
        files.try_map(|file| {
            if is_ext(&file, "css") {
                self.compile_css(file)
            } else if is_ext(&file, "js") {
                self.check_js(file)
            } else {
                Ok(file)
            }
        })
    }
}
