// src/pipeline/stages/lint.rs

use std::sync::Arc;

use tracing::debug;

use crate::errors::StageError;
use crate::pipeline::stages::is_ext;
use crate::pipeline::{css, js, Diagnostic, FileSet, SourceFile, Stage, StageContext};
use crate::types::StageKind;

/// Reports rule violations to the diagnostic sink. Never fails and never
/// changes its input.
pub struct LintStage {
    ctx: Arc<StageContext>,
}

impl LintStage {
    pub fn new(ctx: Arc<StageContext>) -> Self {
        Self { ctx }
    }

    fn report(&self, file: &SourceFile, line: usize, rule: &'static str, message: String) {
        let (source, line) = match file.locate(line.saturating_sub(1)) {
            Some((source, src_line)) => (source.to_string(), src_line + 1),
            None => (file.display_name(), line),
        };
        self.ctx.sink.report(Diagnostic {
            file: source,
            line,
            rule,
            message,
        });
    }

    fn lint_file(&self, file: &SourceFile) {
        let Ok(text) = file.text() else {
            return;
        };

        let mut count = 0usize;
        if is_ext(file, "css") {
            for f in css::lint(text) {
                self.report(file, f.line, f.rule, f.message);
                count += 1;
            }
        } else if is_ext(file, "js") {
            for f in js::lint(text) {
                self.report(file, f.line, f.rule, f.message);
                count += 1;
            }
        } else {
            return;
        }

        for (i, line) in text.lines().enumerate() {
            if line.ends_with([' ', '\t']) {
                self.report(
                    file,
                    i + 1,
                    "no-trailing-spaces",
                    "Trailing spaces not allowed.".to_string(),
                );
                count += 1;
            }
        }
        debug!(file = %file.display_name(), violations = count, "linted");
    }
}

impl Stage for LintStage {
    fn kind(&self) -> StageKind {
        StageKind::Lint
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, StageError> {
        for file in files.files() {
            self.lint_file(file);
        }
        Ok(files)
    }
}
