use std::error::Error;
use std::io::Cursor;
use std::sync::Arc;

use assetflow::errors::StageError;
use assetflow::fs::MockFileSystem;
use assetflow::pipeline::stages::{insert_suffix, render_banner, strip_jpeg_metadata};
use assetflow::pipeline::{svg, FileSet, Pipeline, SourceFile, SourceMap};
use assetflow::types::{AssetClass, StageKind};
use assetflow_test_utils::{sample_metadata, stage_context, CollectingSink};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

type TestResult = Result<(), Box<dyn Error>>;

fn run(class: AssetClass, kinds: &[StageKind], files: Vec<SourceFile>) -> Result<FileSet, StageError> {
    let ctx = stage_context(
        class,
        Arc::new(MockFileSystem::new()),
        Arc::new(CollectingSink::new()),
    );
    Pipeline::for_kinds(kinds, &ctx).run(FileSet::new(files))
}

fn icon(rel: &str, text: &str) -> SourceFile {
    SourceFile::from_source(rel, format!("src/icons/{rel}"), text)
}

#[test]
fn banner_has_fixed_shape() {
    let banner = render_banner(&sample_metadata(), 2024);
    assert_eq!(
        banner,
        "/*!\n * site\n * Sample Site\n * https://example.org\n * @author Jo Doe\n * @version 1.0.0\n * Copyright 2024. MIT licensed.\n */\n"
    );
    assert_eq!(banner.matches('\n').count(), 8);
}

#[test]
fn banner_stage_skips_non_text_assets() -> TestResult {
    let out = run(
        AssetClass::Images,
        &[StageKind::Banner],
        vec![SourceFile::from_source("logo.gif", "src/img/logo.gif", b"GIF89a".to_vec())],
    )?;
    assert_eq!(out.files()[0].contents, b"GIF89a");
    Ok(())
}

#[test]
fn suffix_goes_before_the_last_extension() {
    assert_eq!(insert_suffix("app.css", ".min"), "app.min.css");
    assert_eq!(insert_suffix("vendor.bundle.js", ".min"), "vendor.bundle.min.js");
    assert_eq!(insert_suffix("LICENSE", ".min"), "LICENSE.min");
    assert_eq!(insert_suffix(".hidden", ".min"), ".hidden.min");
}

#[test]
fn rename_keeps_subdirectories() -> TestResult {
    let out = run(
        AssetClass::Styles,
        &[StageKind::Rename],
        vec![SourceFile::from_source("themes/dark.css", "src/css/themes/dark.css", "a{}")],
    )?;
    assert_eq!(out.files()[0].path, std::path::PathBuf::from("themes/dark.min.css"));
    Ok(())
}

#[test]
fn sourcemap_without_prior_map_maps_lines_to_origins() -> TestResult {
    let out = run(
        AssetClass::Scripts,
        &[StageKind::Concat, StageKind::SourceMap],
        vec![
            SourceFile::from_source("a.js", "src/js/a.js", "one();"),
            SourceFile::from_source("b.js", "src/js/b.js", "two();\nthree();"),
        ],
    )?;

    let code = out.find("scripts.js").ok_or("missing scripts.js")?.text()?;
    assert_eq!(code, "one();\ntwo();\nthree();\n//# sourceMappingURL=scripts.js.map");

    let map_file = out.find("scripts.js.map").ok_or("missing map")?;
    assert!(map_file.origins.is_empty());
    let json: serde_json::Value = serde_json::from_str(map_file.text()?)?;
    assert_eq!(json["file"], "scripts.js");
    assert_eq!(json["version"], 3);

    let map = SourceMap::from_json("/", map_file.text()?)?;
    assert_eq!(map.get_sources(), &vec!["src/js/a.js", "src/js/b.js"]);
    let lines: Vec<(u32, u32, u32)> = map
        .get_mappings()
        .iter()
        .filter_map(|m| {
            let o = m.original?;
            Some((m.generated_line, o.source, o.original_line))
        })
        .collect();
    assert_eq!(lines, vec![(0, 0, 0), (1, 1, 0), (2, 1, 1)]);
    Ok(())
}

#[test]
fn sprite_wraps_icons_in_prefixed_symbols() -> TestResult {
    let a = r##"<?xml version="1.0"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10">
  <title>A</title>
  <defs><linearGradient id="g"/></defs>
  <path fill="url(#g)" d="M0 0h10v10z"/>
</svg>"##;
    let b = r##"<svg width="20" height="20"><circle id="dot" r="5"/><use xlink:href="#dot"/></svg>"##;

    let out = run(
        AssetClass::Icons,
        &[StageKind::Sprite],
        vec![icon("a.svg", a), icon("nested/b.svg", b)],
    )?;
    assert_eq!(out.len(), 1);
    let sprite = out.find("icons.svg").ok_or("missing sprite")?.text()?;

    assert!(sprite.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" style="display:none""#), "{sprite}");
    assert!(sprite.contains(r#"xmlns:xlink="http://www.w3.org/1999/xlink""#));
    assert!(sprite.contains(r#"<defs><linearGradient id="a-g"/></defs>"#), "{sprite}");
    assert!(sprite.contains(r#"<symbol id="a" viewBox="0 0 10 10"><path fill="url(#a-g)" d="M0 0h10v10z"/></symbol>"#), "{sprite}");
    assert!(sprite.contains(r##"<symbol id="b" viewBox="0 0 20 20"><circle id="b-dot" r="5"/><use xlink:href="#b-dot"/></symbol>"##), "{sprite}");
    assert!(!sprite.contains("<title>"));

    let root = svg::parse(sprite)?;
    assert_eq!(root.attr("style"), Some("display:none"));
    Ok(())
}

#[test]
fn sprite_namespaces_colliding_ids_per_icon() -> TestResult {
    let shape = r##"<svg viewBox="0 0 4 4"><path id="icon" d="M0 0h4"/><use href="#icon"/></svg>"##;

    let out = run(
        AssetClass::Icons,
        &[StageKind::Sprite],
        vec![icon("a.svg", shape), icon("b.svg", shape)],
    )?;
    let sprite = out.find("icons.svg").ok_or("missing sprite")?.text()?;

    assert!(sprite.contains(r#"<symbol id="a" viewBox="0 0 4 4">"#), "{sprite}");
    assert!(sprite.contains(r#"<symbol id="b" viewBox="0 0 4 4">"#), "{sprite}");
    assert!(sprite.contains(r#"id="a-icon""#), "{sprite}");
    assert!(sprite.contains(r#"id="b-icon""#), "{sprite}");
    assert!(sprite.contains(r##"href="#a-icon""##), "{sprite}");
    assert!(sprite.contains(r##"href="#b-icon""##), "{sprite}");
    assert!(!sprite.contains(r#"id="icon""#), "{sprite}");
    Ok(())
}

#[test]
fn sprite_rejects_duplicate_icon_names() {
    let err = run(
        AssetClass::Icons,
        &[StageKind::Sprite],
        vec![
            icon("ui/close.svg", "<svg/>"),
            icon("nav/close.svg", "<svg/>"),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, StageError::Transform { stage: "sprite", .. }));
    assert!(err.to_string().contains("duplicate icon name 'close'"), "{err}");
}

#[test]
fn sprite_reports_malformed_icons() {
    let err = run(
        AssetClass::Icons,
        &[StageKind::Sprite],
        vec![icon("bad.svg", "<svg><path></svg>")],
    )
    .unwrap_err();
    assert!(err.to_string().contains("src/icons/bad.svg"), "{err}");
}

fn loose_png() -> Result<Vec<u8>, Box<dyn Error>> {
    let img = RgbaImage::from_pixel(64, 64, Rgba([10, 20, 30, 255]));
    let mut buf = Cursor::new(Vec::new());
    PngEncoder::new_with_quality(&mut buf, CompressionType::Fast, FilterType::NoFilter)
        .write_image(img.as_raw(), 64, 64, ColorType::Rgba8)?;
    Ok(buf.into_inner())
}

#[test]
fn optimize_png_never_grows_and_keeps_pixels() -> TestResult {
    let original = loose_png()?;
    let out = run(
        AssetClass::Images,
        &[StageKind::Optimize],
        vec![SourceFile::from_source("dot.png", "src/img/dot.png", original.clone())],
    )?;

    let optimized = &out.files()[0].contents;
    assert!(optimized.len() <= original.len());
    let decoded = image::load_from_memory_with_format(optimized, ImageFormat::Png)?.to_rgba8();
    assert_eq!(decoded.dimensions(), (64, 64));
    assert_eq!(decoded.get_pixel(5, 5), &Rgba([10, 20, 30, 255]));
    Ok(())
}

#[test]
fn optimize_rejects_corrupt_png() {
    let err = run(
        AssetClass::Images,
        &[StageKind::Optimize],
        vec![SourceFile::from_source("x.png", "src/img/x.png", b"\x89PNG broken".to_vec())],
    )
    .unwrap_err();
    assert!(matches!(err, StageError::Transform { stage: "optimize", .. }));
}

#[test]
fn jpeg_metadata_segments_are_dropped() -> TestResult {
    let mut jpeg = vec![0xFF, 0xD8];
    // APP0 (JFIF) is kept.
    jpeg.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x06, b'J', b'F', b'I', b'F']);
    // APP1 (EXIF) and COM are dropped.
    jpeg.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x06, b'E', b'x', b'i', b'f']);
    jpeg.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x04, b'h', b'i']);
    // APP14 (Adobe) is kept.
    jpeg.extend_from_slice(&[0xFF, 0xEE, 0x00, 0x03, 0x01]);
    // SOS and everything after it is copied.
    jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9]);

    let stripped = strip_jpeg_metadata(&jpeg)?;

    let mut expected = vec![0xFF, 0xD8];
    expected.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x06, b'J', b'F', b'I', b'F']);
    expected.extend_from_slice(&[0xFF, 0xEE, 0x00, 0x03, 0x01]);
    expected.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9]);
    assert_eq!(stripped, expected);

    assert!(strip_jpeg_metadata(b"not a jpeg").is_err());
    assert!(strip_jpeg_metadata(&[0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x40]).is_err());
    Ok(())
}

#[test]
fn optimize_jpeg_still_decodes() -> TestResult {
    let img = RgbImage::from_pixel(16, 16, Rgb([200, 100, 50]));
    let mut buf = Vec::new();
    JpegEncoder::new(&mut buf).encode(img.as_raw(), 16, 16, ColorType::Rgb8)?;

    let out = run(
        AssetClass::Images,
        &[StageKind::Optimize],
        vec![SourceFile::from_source("photo.jpg", "src/img/photo.jpg", buf.clone())],
    )?;
    let optimized = &out.files()[0].contents;
    assert!(optimized.len() <= buf.len());
    let decoded = image::load_from_memory_with_format(optimized, ImageFormat::Jpeg)?;
    assert_eq!((decoded.width(), decoded.height()), (16, 16));
    Ok(())
}

#[test]
fn optimize_checks_gif_header_and_copies() -> TestResult {
    let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec();
    let out = run(
        AssetClass::Images,
        &[StageKind::Optimize],
        vec![SourceFile::from_source("a.gif", "src/img/a.gif", gif.clone())],
    )?;
    assert_eq!(out.files()[0].contents, gif);

    let err = run(
        AssetClass::Images,
        &[StageKind::Optimize],
        vec![SourceFile::from_source("b.gif", "src/img/b.gif", b"PNG?".to_vec())],
    )
    .unwrap_err();
    assert!(err.to_string().contains("not a GIF image"), "{err}");
    Ok(())
}

#[test]
fn optimize_svg_drops_editor_cruft_but_keeps_view_box() -> TestResult {
    let src = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" viewBox="0 0 1 1" inkscape:version="1.0">
  <metadata>generated</metadata>
  <g></g>
  <rect width="1" height="1"/>
</svg>"#;
    let out = run(
        AssetClass::Images,
        &[StageKind::Optimize],
        vec![SourceFile::from_source("r.svg", "src/img/r.svg", src)],
    )?;
    assert_eq!(
        out.files()[0].text()?,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1 1"><rect width="1" height="1"/></svg>"#
    );
    Ok(())
}

#[test]
fn unknown_image_types_pass_through() -> TestResult {
    let out = run(
        AssetClass::Images,
        &[StageKind::Optimize],
        vec![SourceFile::from_source("a.webp", "src/img/a.webp", b"RIFF".to_vec())],
    )?;
    assert_eq!(out.files()[0].contents, b"RIFF");
    Ok(())
}
