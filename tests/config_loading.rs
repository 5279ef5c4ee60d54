use std::error::Error;
use std::path::PathBuf;

use assetflow::config::model::AuthorField;
use assetflow::config::{load_and_validate, load_from_str, resolve, resolve_named, ConfigFile};
use assetflow::errors::AssetflowError;
use assetflow::types::{AssetClass, StageKind, TriggerWhileRunningBehaviour};
use assetflow_test_utils::builders::{asset_paths, ConfigFileBuilder, TaskConfigBuilder};
use assetflow_test_utils::write_file;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn empty_file_yields_classic_layout_and_default_tasks() -> TestResult {
    let cfg = ConfigFile::try_from(load_from_str("")?)?;

    assert_eq!(
        cfg.config().triggered_while_running_behaviour,
        TriggerWhileRunningBehaviour::Queue
    );
    assert_eq!(cfg.config().queue_length, 1);

    let styles = cfg.asset(AssetClass::Styles);
    assert_eq!(styles.src, vec!["src/css/*.css".to_string()]);
    assert_eq!(styles.dest, "dist/assets/css");
    assert_eq!(styles.stages, AssetClass::Styles.default_stages());

    let scripts = cfg.asset(AssetClass::Scripts);
    assert_eq!(
        scripts.src,
        vec!["src/js/plugins/*.js".to_string(), "src/js/*.js".to_string()]
    );
    assert_eq!(scripts.concat, "scripts.js");

    let names: Vec<&str> = cfg.tasks().keys().map(String::as_str).collect();
    assert_eq!(names, vec!["build", "css", "images", "js", "svg-sprite"]);

    let build = cfg.task("build").ok_or("missing build task")?;
    assert!(build.is_aggregate());
    assert!(!build.watch);
    assert_eq!(build.after.len(), 4);

    let css = cfg.task("css").ok_or("missing css task")?;
    assert_eq!(css.asset, Some(AssetClass::Styles));
    assert!(css.watch);

    assert_eq!(cfg.server().port, 3000);
    assert_eq!(cfg.server().root, "dist");
    assert_eq!(cfg.server().reload_on, vec!["dist/*.html".to_string()]);
    Ok(())
}

#[test]
fn project_roots_move_every_default_path() -> TestResult {
    let cfg = ConfigFileBuilder::new().with_project("web", "public").try_build()?;

    assert_eq!(cfg.asset(AssetClass::Styles).src, vec!["web/css/*.css".to_string()]);
    assert_eq!(cfg.asset(AssetClass::Images).dest, "public/assets/img");
    assert_eq!(cfg.server().root, "public");
    Ok(())
}

#[test]
fn asset_override_sets_watch_to_sources_unless_given() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_asset(AssetClass::Styles, asset_paths(&["styles/*.css"], "out/css"))
        .try_build()?;

    let styles = cfg.asset(AssetClass::Styles);
    assert_eq!(styles.src, vec!["styles/*.css".to_string()]);
    assert_eq!(styles.watch, styles.src);
    assert_eq!(styles.dest, "out/css");
    Ok(())
}

#[test]
fn task_stage_subset_must_keep_pipeline_order() -> TestResult {
    let ok = ConfigFileBuilder::new()
        .with_task(
            "css-lint",
            TaskConfigBuilder::asset(AssetClass::Styles)
                .stages(&["lint"])
                .build(),
        )
        .try_build()?;
    assert_eq!(
        ok.task("css-lint").ok_or("missing task")?.stages,
        vec![StageKind::Lint]
    );

    let err = ConfigFileBuilder::new()
        .with_task(
            "css",
            TaskConfigBuilder::asset(AssetClass::Styles)
                .stages(&["minify", "lint"])
                .build(),
        )
        .try_build()
        .unwrap_err();
    assert!(matches!(err, AssetflowError::ConfigError(_)));
    assert!(err.to_string().contains("out of order"), "{err}");
    Ok(())
}

#[test]
fn stages_without_asset_are_rejected() {
    let mut task = TaskConfigBuilder::aggregate().build();
    task.stages = Some(vec!["lint".to_string()]);

    let err = ConfigFileBuilder::new()
        .with_task("odd", task)
        .try_build()
        .unwrap_err();
    assert!(err.to_string().contains("requires `asset`"), "{err}");
}

#[test]
fn unknown_asset_class_is_a_configuration_error() {
    let raw = load_from_str("[task.fonts]\nasset = \"fonts\"\n").unwrap();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, AssetflowError::ConfigError(_)));
    assert!(err.to_string().contains("unknown asset class"), "{err}");

    let raw = load_from_str("[assets.fonts]\nsrc = [\"a/*.woff\"]\n").unwrap();
    assert!(ConfigFile::try_from(raw).is_err());
}

#[test]
fn malformed_glob_is_a_configuration_error() {
    let err = ConfigFileBuilder::new()
        .with_asset(AssetClass::Scripts, asset_paths(&["src/js/[*.js"], "dist/js"))
        .try_build()
        .unwrap_err();
    assert!(err.to_string().contains("invalid glob"), "{err}");
}

#[test]
fn destination_inside_source_directory_is_rejected() {
    let err = ConfigFileBuilder::new()
        .with_asset(AssetClass::Styles, asset_paths(&["src/css/*.css"], "src/css/out"))
        .try_build()
        .unwrap_err();
    assert!(err.to_string().contains("overlaps"), "{err}");
}

#[test]
fn watch_glob_covering_the_destination_is_rejected() {
    let raw = load_from_str("[assets.styles]\nwatch = [\"**/*.css\"]\n").unwrap();
    let err = ConfigFile::try_from(raw).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("[assets.styles].watch"), "{message}");
    assert!(message.contains("overlaps"), "{message}");

    let raw = load_from_str("[assets.styles]\nwatch = [\"src/**/*.css\"]\n").unwrap();
    assert!(ConfigFile::try_from(raw).is_ok());
}

#[test]
fn stage_unsupported_by_class_is_rejected() {
    let raw = load_from_str("[assets.images]\nstages = [\"prefix\"]\n").unwrap();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("not supported"), "{err}");
}

#[test]
fn unknown_dependency_and_self_dependency_are_rejected() {
    let err = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::aggregate().after("ghost").build())
        .try_build()
        .unwrap_err();
    assert!(err.to_string().contains("unknown dependency 'ghost'"), "{err}");

    let err = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::aggregate().after("a").build())
        .try_build()
        .unwrap_err();
    assert!(err.to_string().contains("itself"), "{err}");
}

#[test]
fn dependency_cycle_is_rejected() {
    let err = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::aggregate().after("b").build())
        .with_task("b", TaskConfigBuilder::aggregate().after("a").build())
        .try_build()
        .unwrap_err();
    assert!(matches!(err, AssetflowError::DagCycle(_)), "{err}");
}

#[test]
fn zero_queue_length_is_rejected() {
    let err = ConfigFileBuilder::new()
        .with_queue_length(0)
        .try_build()
        .unwrap_err();
    assert!(err.to_string().contains("queue_length"), "{err}");
}

#[test]
fn browsers_are_validated_and_encoded() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_browser("safari", "13.1")
        .try_build()?;
    assert_eq!(cfg.browsers().get("safari"), Some((13 << 16) | (1 << 8)));
    assert_eq!(cfg.browsers().get("chrome"), None);

    let err = ConfigFileBuilder::new()
        .with_browser("netscape", "4")
        .try_build()
        .unwrap_err();
    assert!(err.to_string().contains("unknown browser"), "{err}");

    let err = ConfigFileBuilder::new()
        .with_browser("chrome", "latest")
        .try_build()
        .unwrap_err();
    assert!(err.to_string().contains("invalid version"), "{err}");
    Ok(())
}

#[test]
fn default_use_hash_applies_unless_task_overrides() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_default_use_hash(true)
        .with_task("css", TaskConfigBuilder::asset(AssetClass::Styles).build())
        .with_task(
            "js",
            TaskConfigBuilder::asset(AssetClass::Scripts)
                .use_hash(false)
                .build(),
        )
        .try_build()?;

    assert!(cfg.task("css").ok_or("css")?.use_hash);
    assert!(!cfg.task("js").ok_or("js")?.use_hash);
    Ok(())
}

#[test]
fn full_toml_document_parses() -> TestResult {
    let raw = load_from_str(
        r#"
[config]
triggered_while_running_behaviour = "cancel"
queue_length = 3

[package]
name = "site"
version = "1.2.3"
author = { name = "Jo Doe" }

[server]
port = 8080
reload_on = ["dist/**/*.html"]

[browsers]
chrome = "90"

[assets.scripts]
src = ["src/js/vendor/*.js", "src/js/app/*.js"]
concat = "bundle.js"

[task.js]
asset = "scripts"
after = []
"#,
    )?;
    assert_eq!(raw.package.author, Some(AuthorField::Person { name: "Jo Doe".into() }));

    let cfg = ConfigFile::try_from(raw)?;
    assert_eq!(
        cfg.config().triggered_while_running_behaviour,
        TriggerWhileRunningBehaviour::Cancel
    );
    assert_eq!(cfg.config().queue_length, 3);
    assert_eq!(cfg.metadata().author, "Jo Doe");
    assert_eq!(cfg.metadata().version, "1.2.3");
    assert_eq!(cfg.server().port, 8080);
    assert_eq!(cfg.asset(AssetClass::Scripts).concat, "bundle.js");
    assert_eq!(cfg.tasks().len(), 1);
    Ok(())
}

#[test]
fn unknown_behaviour_is_a_toml_error() {
    let err = load_from_str("[config]\ntriggered_while_running_behaviour = \"restart\"\n")
        .unwrap_err();
    assert!(matches!(err, AssetflowError::TomlError(_)), "{err}");
}

#[test]
fn package_json_fills_missing_metadata_only() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_file(
        dir.path(),
        "package.json",
        r#"{ "name": "from-json", "version": "0.9.0", "license": "MIT",
             "homepage": "https://example.org", "author": "Pat" }"#,
    );
    let config = write_file(
        dir.path(),
        "Assetflow.toml",
        "[package]\npackage_json = \"package.json\"\nname = \"inline\"\n",
    );

    let cfg = load_and_validate(&config)?;
    let meta = cfg.metadata();
    assert_eq!(meta.name, "inline");
    assert_eq!(meta.version, "0.9.0");
    assert_eq!(meta.license, "MIT");
    assert_eq!(meta.url, "https://example.org");
    assert_eq!(meta.author, "Pat");
    Ok(())
}

#[test]
fn missing_package_json_is_a_configuration_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = write_file(
        dir.path(),
        "Assetflow.toml",
        "[package]\npackage_json = \"nope.json\"\n",
    );
    let err = load_and_validate(&config).unwrap_err();
    assert!(matches!(err, AssetflowError::ConfigError(_)), "{err}");
    Ok(())
}

#[test]
fn resolver_is_a_pure_lookup() -> TestResult {
    let cfg = ConfigFileBuilder::new().build();

    let paths = resolve(&cfg, AssetClass::Icons);
    assert_eq!(paths.sources, vec!["src/icons/**/*.svg".to_string()]);
    assert_eq!(paths.destination, PathBuf::from("dist/assets/img"));

    assert_eq!(resolve_named(&cfg, "styles")?, resolve(&cfg, AssetClass::Styles));

    let err = resolve_named(&cfg, "videos").unwrap_err();
    assert!(matches!(err, AssetflowError::ConfigError(_)));
    Ok(())
}

#[test]
fn shipped_sample_config_is_valid() -> TestResult {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Assetflow.toml");
    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.metadata().author, "Jo Doe");
    assert_eq!(cfg.server().reload_on, vec!["dist/*.html".to_string()]);
    assert!(cfg.task("css").ok_or("missing css")?.use_hash);

    let lint = cfg.task("css-lint").ok_or("missing css-lint")?;
    assert_eq!(lint.stages, vec![StageKind::Lint]);
    assert!(!lint.watch);
    Ok(())
}
