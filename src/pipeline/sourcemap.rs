// src/pipeline/sourcemap.rs

//! Source maps are `parcel_sourcemap` maps with project-relative sources.
//!
//! Every rewriting stage produces a step map from its output back to its
//! input. [`compose`] folds that step into what the file already knows, so
//! the map a file carries always points at the original sources.

use std::collections::BTreeMap;

pub use parcel_sourcemap::{Mapping, OriginalLocation, SourceMap, SourceMapError};

use crate::pipeline::{locate_in, Origin};

/// An empty map. Relative sources are kept as they are.
pub fn new_map() -> SourceMap {
    SourceMap::new("/")
}

/// Where a step map's input positions resolve to.
#[derive(Clone, Copy)]
pub enum Prior<'a> {
    /// The step input already carries a map.
    Map(&'a SourceMap),
    /// The step input is attributed line by line.
    Origins(&'a [Origin]),
}

/// Mappings of one map grouped by generated line, sorted by column.
struct LineIndex {
    lines: BTreeMap<u32, Vec<(u32, OriginalLocation)>>,
}

impl LineIndex {
    fn new(map: &SourceMap) -> Self {
        let mut lines: BTreeMap<u32, Vec<(u32, OriginalLocation)>> = BTreeMap::new();
        for m in map.get_mappings() {
            if let Some(original) = m.original {
                lines
                    .entry(m.generated_line)
                    .or_default()
                    .push((m.generated_column, original));
            }
        }
        for segments in lines.values_mut() {
            segments.sort_by_key(|(column, _)| *column);
        }
        Self { lines }
    }

    /// The last segment at or before `column`, or the first one on the line.
    fn lookup(&self, line: u32, column: u32) -> Option<OriginalLocation> {
        let segments = self.lines.get(&line)?;
        let at = segments.partition_point(|(c, _)| *c <= column);
        let (_, original) = segments.get(at.saturating_sub(1))?;
        Some(*original)
    }
}

/// Resolve every mapping of `step` through `prior`. Mappings that resolve
/// nowhere are dropped.
pub fn compose(step: &SourceMap, prior: Prior<'_>) -> SourceMap {
    let mut out = new_map();
    let index = match prior {
        Prior::Map(prev) => Some(LineIndex::new(prev)),
        Prior::Origins(_) => None,
    };

    for m in step.get_mappings() {
        let Some(original) = m.original else { continue };
        let resolved = match (prior, &index) {
            (Prior::Map(prev), Some(index)) => index
                .lookup(original.original_line, original.original_column)
                .and_then(|found| {
                    let source = prev.get_source(found.source).ok()?;
                    Some((source, found.original_line, found.original_column))
                }),
            (Prior::Origins(origins), _) => locate_in(origins, original.original_line as usize)
                .map(|(source, line)| (source, line as u32, original.original_column)),
            _ => None,
        };
        let Some((source, line, column)) = resolved else { continue };
        let source = out.add_source(source);
        out.add_mapping(
            m.generated_line,
            m.generated_column,
            Some(OriginalLocation::new(line, column, source, None)),
        );
    }
    out
}

/// Line-level map built from origins alone.
pub fn line_map(origins: &[Origin]) -> SourceMap {
    let mut map = new_map();
    for origin in origins {
        let source = map.add_source(&origin.source);
        for i in 0..origin.line_count {
            map.add_mapping(
                (origin.start_line + i) as u32,
                0,
                Some(OriginalLocation::new(
                    (origin.source_line + i) as u32,
                    0,
                    source,
                    None,
                )),
            );
        }
    }
    map
}

/// Serialize with a `file` entry naming the generated file.
pub fn to_json(map: &mut SourceMap, file: &str) -> Result<String, SourceMapError> {
    let json = map.to_json(None)?;
    let mut value: serde_json::Value = serde_json::from_str(&json)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("file".to_string(), serde_json::Value::from(file));
    }
    Ok(serde_json::to_string(&value)?)
}
