// src/pipeline/stages/optimize.rs

use std::io::Cursor;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, ImageFormat};
use tracing::debug;

use crate::errors::StageError;
use crate::pipeline::stages::minify::minify_svg;
use crate::pipeline::{FileSet, SourceFile, Stage};
use crate::types::StageKind;

/// Lossless image size reduction.
///
/// - PNG: re-encoded at maximum compression, kept only when smaller.
/// - JPEG: metadata segments removed, image data untouched.
/// - SVG: minified, `viewBox` kept.
/// - GIF: validated and copied.
pub struct OptimizeStage;

fn fail(file: &SourceFile, message: impl Into<String>) -> StageError {
    StageError::transform("optimize", file.display_name(), message)
}

fn optimize_png(file: &SourceFile) -> Result<Option<Vec<u8>>, StageError> {
    let img = image::load_from_memory_with_format(&file.contents, ImageFormat::Png)
        .map_err(|e| fail(file, e.to_string()))?;

    let mut buf = Cursor::new(Vec::new());
    PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
        .write_image(img.as_bytes(), img.width(), img.height(), img.color())
        .map_err(|e| fail(file, e.to_string()))?;

    let encoded = buf.into_inner();
    Ok((encoded.len() < file.contents.len()).then_some(encoded))
}

/// Drop APP1..APP15 (except the Adobe APP14 colour marker) and COM segments.
pub fn strip_jpeg_metadata(data: &[u8]) -> Result<Vec<u8>, String> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err("missing JPEG start-of-image marker".to_string());
    }

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..2]);
    let mut pos = 2;

    while pos < data.len() {
        if data[pos] != 0xFF {
            return Err(format!("expected marker at offset {pos}"));
        }
        let marker = *data
            .get(pos + 1)
            .ok_or_else(|| "truncated marker".to_string())?;
        match marker {
            // Fill byte.
            0xFF => {
                pos += 1;
                continue;
            }
            // Standalone markers.
            0x01 | 0xD0..=0xD7 => {
                out.extend_from_slice(&data[pos..pos + 2]);
                pos += 2;
                continue;
            }
            0xD9 => {
                out.extend_from_slice(&data[pos..pos + 2]);
                return Ok(out);
            }
            _ => {}
        }

        let len_bytes = data
            .get(pos + 2..pos + 4)
            .ok_or_else(|| "truncated segment length".to_string())?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > data.len() {
            return Err(format!("segment at offset {pos} overruns the file"));
        }

        // Start of scan: the entropy-coded data follows; copy the rest.
        if marker == 0xDA {
            out.extend_from_slice(&data[pos..]);
            return Ok(out);
        }

        let is_metadata = matches!(marker, 0xE1..=0xEF if marker != 0xEE) || marker == 0xFE;
        if !is_metadata {
            out.extend_from_slice(&data[pos..end]);
        }
        pos = end;
    }
    Ok(out)
}

fn optimize_jpeg(file: &SourceFile) -> Result<Vec<u8>, StageError> {
    image::load_from_memory_with_format(&file.contents, ImageFormat::Jpeg)
        .map_err(|e| fail(file, e.to_string()))?;
    strip_jpeg_metadata(&file.contents).map_err(|e| fail(file, e))
}

fn check_gif(file: &SourceFile) -> Result<(), StageError> {
    if file.contents.starts_with(b"GIF87a") || file.contents.starts_with(b"GIF89a") {
        Ok(())
    } else {
        Err(fail(file, "not a GIF image"))
    }
}

impl Stage for OptimizeStage {
    fn kind(&self) -> StageKind {
        StageKind::Optimize
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, StageError> {
        files.try_map(|mut file| {
            let before = file.contents.len();
            match file.extension().as_deref() {
                Some("png") => {
                    if let Some(smaller) = optimize_png(&file)? {
                        file.contents = smaller;
                    }
                }
                Some("jpg" | "jpeg") => file.contents = optimize_jpeg(&file)?,
                Some("svg") => {
                    let out = minify_svg(&file, "optimize")?;
                    file.set_text(out);
                }
                Some("gif") => check_gif(&file)?,
                _ => {}
            }
            debug!(
                file = %file.display_name(),
                before,
                after = file.contents.len(),
                "optimized"
            );
            Ok(file)
        })
    }
}
