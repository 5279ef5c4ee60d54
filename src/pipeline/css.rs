// src/pipeline/css.rs

//! Stylesheet helpers: partial inlining, lightningcss compile/prefix/minify
//! and the regex-based lint rules.

use std::fmt::Display;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use lightningcss::error::Error as CssError;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::Regex;

use crate::config::model::BrowserTargets;
use crate::errors::StageError;
use crate::fs::FileSystem;
use crate::pipeline::sourcemap::{self, SourceMap};
use crate::pipeline::Origin;

pub fn targets(browsers: &BrowserTargets) -> Targets {
    let b = Browsers {
        android: browsers.get("android"),
        chrome: browsers.get("chrome"),
        edge: browsers.get("edge"),
        firefox: browsers.get("firefox"),
        ie: browsers.get("ie"),
        ios_saf: browsers.get("ios_saf"),
        opera: browsers.get("opera"),
        safari: browsers.get("safari"),
        samsung: browsers.get("samsung"),
    };
    Targets::from(b)
}

fn line_at(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

fn css_error<T: Display>(file: &str, err: CssError<T>) -> StageError {
    StageError::Compile {
        file: file.to_string(),
        line: err.loc.as_ref().map_or(1, |loc| loc.line as usize + 1),
        message: err.kind.to_string(),
    }
}

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*@import\s+(?:url\(\s*)?["']([^"']+)["']\s*\)?([^;]*);"#)
        .expect("valid regex")
});

/// Stylesheet text with its `@import`s inlined, and the origin of each line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inlined {
    pub text: String,
    pub origins: Vec<Origin>,
}

/// Replace local `@import` rules with the imported file's contents.
///
/// `@import "name"` looks for `name`, `name.css` and `_name.css` next to the
/// importing file. Remote imports are left alone; imports with media
/// queries are wrapped in an `@media` block.
pub fn inline_imports(
    fs: &dyn FileSystem,
    path: &Path,
    display: &str,
    text: &str,
) -> Result<Inlined, StageError> {
    let mut inliner = Inliner {
        fs,
        out: String::with_capacity(text.len()),
        out_line: 0,
        origins: Vec::new(),
        stack: vec![path.to_path_buf()],
    };
    inliner.inline(path, display, text)?;
    Ok(Inlined {
        text: inliner.out,
        origins: inliner.origins,
    })
}

struct Inliner<'a> {
    fs: &'a dyn FileSystem,
    out: String,
    out_line: usize,
    origins: Vec<Origin>,
    stack: Vec<PathBuf>,
}

impl Inliner<'_> {
    /// Append `piece`, whose first line is `line` (0-based) of `source`.
    /// A line that starts mid-way through the output keeps the origin of
    /// the line it continues.
    fn push(&mut self, piece: &str, source: &str, mut line: usize) {
        let mut at_line_start = self.out.is_empty() || self.out.ends_with('\n');
        for segment in piece.split_inclusive('\n') {
            if at_line_start {
                self.attribute(source, line);
            }
            self.out.push_str(segment);
            at_line_start = segment.ends_with('\n');
            if at_line_start {
                self.out_line += 1;
                line += 1;
            }
        }
    }

    fn attribute(&mut self, source: &str, line: usize) {
        if let Some(last) = self.origins.last_mut() {
            let continues = last.source == source
                && last.start_line + last.line_count == self.out_line
                && last.source_line + last.line_count == line;
            if continues {
                last.line_count += 1;
                return;
            }
        }
        self.origins.push(Origin {
            source: source.to_string(),
            start_line: self.out_line,
            line_count: 1,
            source_line: line,
        });
    }

    fn inline(&mut self, path: &Path, display: &str, text: &str) -> Result<(), StageError> {
        let mut last = 0;

        for caps in IMPORT.captures_iter(text) {
            let (Some(whole), Some(target)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = target.as_str();
            if name.starts_with("http:") || name.starts_with("https:") || name.starts_with("//") {
                continue;
            }
            let line = line_at(text, whole.start());

            let partial = resolve_partial(self.fs, path, name).ok_or_else(|| {
                StageError::Compile {
                    file: display.to_string(),
                    line,
                    message: format!("cannot resolve @import \"{name}\""),
                }
            })?;
            if self.stack.contains(&partial) {
                return Err(StageError::Compile {
                    file: display.to_string(),
                    line,
                    message: format!("circular @import \"{name}\""),
                });
            }

            let contents = self.fs.read_to_string(&partial).map_err(|e| StageError::Io {
                path: partial.clone(),
                message: format!("{e:#}"),
            })?;
            let partial_display = partial_display(display, path, &partial);

            self.push(&text[last..whole.start()], display, line_at(text, last) - 1);
            let media = caps.get(2).map_or("", |m| m.as_str().trim());
            if !media.is_empty() {
                self.push(&format!("@media {media} {{\n"), display, line - 1);
            }
            self.stack.push(partial.clone());
            self.inline(&partial, &partial_display, &contents)?;
            self.stack.pop();
            if !media.is_empty() {
                self.push("\n}", display, line - 1);
            }
            last = whole.end();
        }

        self.push(&text[last..], display, line_at(text, last) - 1);
        Ok(())
    }
}

/// Project-relative name of `partial`, imported from `importer` which is
/// shown as `display`.
fn partial_display(display: &str, importer: &Path, partial: &Path) -> String {
    let dir = importer.parent().unwrap_or_else(|| Path::new(""));
    let Ok(relative) = partial.strip_prefix(dir) else {
        return partial.to_string_lossy().replace('\\', "/");
    };
    let joined = Path::new(display)
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(relative);

    let mut parts: Vec<String> = Vec::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if parts.last().is_some_and(|p| p != "..") => {
                parts.pop();
            }
            other => parts.push(other.as_os_str().to_string_lossy().into_owned()),
        }
    }
    parts.join("/")
}

fn resolve_partial(fs: &dyn FileSystem, importer: &Path, name: &str) -> Option<PathBuf> {
    let dir = importer.parent().unwrap_or_else(|| Path::new(""));
    let target = dir.join(name);
    let file_name = target.file_name()?.to_string_lossy().into_owned();
    let has_ext = name.ends_with(".css");

    let mut candidates = vec![target.clone()];
    if !has_ext {
        candidates.push(target.with_file_name(format!("{file_name}.css")));
        candidates.push(target.with_file_name(format!("_{file_name}.css")));
    } else {
        candidates.push(target.with_file_name(format!("_{file_name}")));
    }
    candidates.into_iter().find(|c| fs.is_file(c))
}

/// Printed stylesheet plus a map from `code` back to the text that was
/// parsed. The map's only source is the file name.
#[derive(Debug, Clone)]
pub struct Printed {
    pub code: String,
    pub map: SourceMap,
}

fn parse<'i>(text: &'i str, file: &str) -> Result<StyleSheet<'i>, StageError> {
    let options = ParserOptions {
        filename: file.to_string(),
        ..ParserOptions::default()
    };
    StyleSheet::parse(text, options).map_err(|e| css_error(file, e))
}

fn print(
    sheet: &StyleSheet<'_>,
    file: &str,
    targets: Targets,
    minify: bool,
) -> Result<Printed, StageError> {
    let mut map = sourcemap::new_map();
    map.add_source(file);
    let printed = sheet
        .to_css(PrinterOptions {
            minify,
            source_map: Some(&mut map),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| css_error(file, e))?;
    Ok(Printed {
        code: printed.code,
        map,
    })
}

fn minify_sheet(
    sheet: &mut StyleSheet<'_>,
    file: &str,
    targets: Targets,
) -> Result<(), StageError> {
    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| css_error(file, e))
}

/// Parse and print with nesting lowered for `targets`.
pub fn compile(text: &str, file: &str, targets: Targets) -> Result<Printed, StageError> {
    let sheet = parse(text, file)?;
    print(&sheet, file, targets, false)
}

/// Add the vendor prefixes `targets` need, keeping readable output.
pub fn prefix(text: &str, file: &str, targets: Targets) -> Result<Printed, StageError> {
    let mut sheet = parse(text, file)?;
    minify_sheet(&mut sheet, file, targets)?;
    print(&sheet, file, targets, false)
}

pub fn minify(text: &str, file: &str, targets: Targets) -> Result<Printed, StageError> {
    let mut sheet = parse(text, file)?;
    minify_sheet(&mut sheet, file, targets)?;
    print(&sheet, file, targets, true)
}

/// A CSS lint finding with a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFinding {
    pub line: usize,
    pub rule: &'static str,
    pub message: String,
}

static EMPTY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*\}").expect("valid regex"));
static IMPORTANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\s*important").expect("valid regex"));
static DECL_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("valid regex"));
static HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w-])#([0-9A-Za-z]+)").expect("valid regex"));

/// Replace comment bodies with spaces, keeping offsets and newlines.
fn blank_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        let end = rest[start + 2..].find("*/").map_or(rest.len(), |i| start + 2 + i + 2);
        for ch in rest[start..end].chars() {
            if ch == '\n' {
                out.push('\n');
            } else {
                out.extend(std::iter::repeat_n(' ', ch.len_utf8()));
            }
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn valid_hex(digits: &str) -> bool {
    matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn lint(text: &str) -> Vec<LintFinding> {
    let text = blank_comments(text);
    let mut findings = Vec::new();

    for m in EMPTY_BLOCK.find_iter(&text) {
        findings.push(LintFinding {
            line: line_at(&text, m.start()),
            rule: "block-no-empty",
            message: "Unexpected empty block".to_string(),
        });
    }
    for m in IMPORTANT.find_iter(&text) {
        findings.push(LintFinding {
            line: line_at(&text, m.start()),
            rule: "declaration-no-important",
            message: "Unexpected !important".to_string(),
        });
    }
    for block in DECL_BLOCK.captures_iter(&text) {
        let Some(body) = block.get(1) else { continue };
        let mut offset = body.start();
        for decl in body.as_str().split(';') {
            if let Some(colon) = decl.find(':') {
                let value = &decl[colon + 1..];
                for hex in HEX.captures_iter(value) {
                    let Some(digits) = hex.get(1) else { continue };
                    if !valid_hex(digits.as_str()) {
                        findings.push(LintFinding {
                            line: line_at(&text, offset + colon + 1 + digits.start()),
                            rule: "color-no-invalid-hex",
                            message: format!("Unexpected invalid hex color \"#{}\"", digits.as_str()),
                        });
                    }
                }
            }
            offset += decl.len() + 1;
        }
    }

    findings.sort_by_key(|f| f.line);
    findings
}
