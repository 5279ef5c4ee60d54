use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assetflow::engine::{RuntimeEvent, TriggerReason};
use assetflow::fs::MockFileSystem;
use assetflow::types::AssetClass;
use assetflow::watch::cache::FileCache;
use assetflow::watch::event_handler::{
    content_changed, matching_bindings, process_file_change, seed_hashes, WatchState,
};
use assetflow::watch::path_utils::{is_editor_artifact, relative_str};
use assetflow::watch::patterns::collect_matching_files;
use assetflow::watch::watcher::active_bindings;
use assetflow::watch::{build_bindings, HashStore, MemoryHashStore, WatchAction, WatchBinding};
use assetflow_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use assetflow_test_utils::{init_tracing, MOCK_ROOT};
use tokio::sync::mpsc;

type TestResult = Result<(), Box<dyn Error>>;

fn labels(bindings: &[WatchBinding]) -> Vec<String> {
    bindings.iter().map(WatchBinding::label).collect()
}

fn css_binding(use_hash: bool) -> Result<WatchBinding, Box<dyn Error>> {
    Ok(WatchBinding::new(
        WatchAction::Task("css".to_string()),
        &["src/css/**/*.css".to_string()],
        &[],
        use_hash,
    )?)
}

#[test]
fn default_config_binds_each_watched_asset_task_plus_reload() -> TestResult {
    let cfg = ConfigFileBuilder::new().build();
    let bindings = build_bindings(&cfg)?;

    assert_eq!(
        labels(&bindings),
        vec![
            "task 'css'",
            "task 'images'",
            "task 'js'",
            "task 'svg-sprite'",
            "reload_on",
        ]
    );

    let hits: Vec<String> = matching_bindings(&bindings, "src/css/partials/_grid.css")
        .into_iter()
        .map(WatchBinding::label)
        .collect();
    assert_eq!(hits, vec!["task 'css'"]);

    assert!(matching_bindings(&bindings, "src/js/lib/deep.js").is_empty());
    assert_eq!(matching_bindings(&bindings, "src/js/plugins/slider.js").len(), 1);
    assert_eq!(
        matching_bindings(&bindings, "dist/index.html")[0].action(),
        &WatchAction::Reload
    );
    Ok(())
}

#[test]
fn unwatched_tasks_get_no_binding() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task("css", TaskConfigBuilder::asset(AssetClass::Styles).build())
        .with_task(
            "js",
            TaskConfigBuilder::asset(AssetClass::Scripts).watch(false).build(),
        )
        .build();
    let bindings = build_bindings(&cfg)?;
    assert_eq!(labels(&bindings), vec!["task 'css'", "reload_on"]);
    Ok(())
}

#[test]
fn exclude_globs_win_over_watch_globs() -> TestResult {
    let binding = WatchBinding::new(
        WatchAction::Task("css".to_string()),
        &["src/**/*.css".to_string()],
        &["src/vendor/**".to_string()],
        false,
    )?;
    assert!(binding.matches("src/app.css"));
    assert!(!binding.matches("src/vendor/reset.css"));
    assert!(!binding.matches("src/app.scss"));
    assert_eq!(binding.base_dirs(), vec![PathBuf::from("src")]);
    Ok(())
}

#[test]
fn bindings_without_any_source_directory_are_dropped() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/css/app.css", "a{}");
    fs.add_file("/proj/src/js/app.js", "x();");

    let bindings = build_bindings(&ConfigFileBuilder::new().build())?;
    let active = active_bindings(&fs, Path::new(MOCK_ROOT), bindings);

    // js keeps its binding since `src/js` exists even though
    // `src/js/plugins` does not.
    assert_eq!(labels(&active), vec!["task 'css'", "task 'js'", "reload_on"]);
    Ok(())
}

#[test]
fn collect_walks_only_the_glob_bases() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/css/b.css", "b{}");
    fs.add_file("/proj/src/css/nested/a.css", "a{}");
    fs.add_file("/proj/src/css/readme.md", "-");
    fs.add_file("/proj/other/c.css", "c{}");

    let files = collect_matching_files(&fs, Path::new(MOCK_ROOT), &css_binding(false)?)?;
    assert_eq!(
        files,
        vec![
            PathBuf::from("/proj/src/css/b.css"),
            PathBuf::from("/proj/src/css/nested/a.css"),
        ]
    );
    Ok(())
}

#[test]
fn content_hash_detects_real_changes_only() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/css/app.css", ".a{}");
    let binding = css_binding(true)?;
    let root = Path::new(MOCK_ROOT);
    let changed = Path::new("/proj/src/css/app.css");

    let mut store = MemoryHashStore::new();
    let mut cache = FileCache::new();

    assert!(content_changed(&fs, root, &binding, changed, &mut store, &mut cache));
    assert!(store.load("task 'css'").is_some());
    assert!(!content_changed(&fs, root, &binding, changed, &mut store, &mut cache));
    assert_eq!(cache.len(), 1);

    fs.add_file("/proj/src/css/app.css", ".a{color:red}");
    assert!(content_changed(&fs, root, &binding, changed, &mut store, &mut cache));

    // A new file changes the aggregate too.
    fs.add_file("/proj/src/css/extra.css", ".b{}");
    let extra = Path::new("/proj/src/css/extra.css");
    assert!(content_changed(&fs, root, &binding, extra, &mut store, &mut cache));

    fs.remove_file("/proj/src/css/extra.css");
    assert!(content_changed(&fs, root, &binding, extra, &mut store, &mut cache));
    Ok(())
}

#[test]
fn editor_artifacts_and_relative_paths() {
    assert!(is_editor_artifact("src/css/app.css~"));
    assert!(is_editor_artifact("src/css/.app.css.swp"));
    assert!(is_editor_artifact("src/css/.#app.css"));
    assert!(is_editor_artifact("src/css/4913"));
    assert!(!is_editor_artifact("src/css/app.css"));

    assert_eq!(
        relative_str(Path::new("/proj"), Path::new("/proj/src/css/app.css")),
        Some("src/css/app.css".to_string())
    );
    assert_eq!(
        relative_str(Path::new("/proj"), Path::new("/nowhere/x.css")),
        None
    );
}

fn state(fs: &MockFileSystem, bindings: Vec<WatchBinding>) -> WatchState {
    let store: Box<dyn HashStore> = Box::new(MemoryHashStore::new());
    WatchState {
        fs: Arc::new(fs.clone()),
        root: PathBuf::from(MOCK_ROOT),
        bindings: Arc::new(bindings),
        hash_store: Arc::new(Mutex::new(store)),
        file_cache: Arc::new(Mutex::new(FileCache::new())),
    }
}

#[tokio::test]
async fn changes_become_trigger_and_reload_events() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/css/app.css", ".a{}");
    let bindings = build_bindings(&ConfigFileBuilder::new().build())?;
    let state = state(&fs, bindings);
    let (tx, mut rx) = mpsc::channel(8);

    assert!(process_file_change(&state, Path::new("/proj/src/css/app.css"), &tx).await);
    match rx.try_recv()? {
        RuntimeEvent::TaskTriggered { task, reason } => {
            assert_eq!(task, "css");
            assert_eq!(reason, TriggerReason::FileWatch);
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert!(process_file_change(&state, Path::new("/proj/dist/index.html"), &tx).await);
    match rx.try_recv()? {
        RuntimeEvent::ReloadRequested { path } => {
            assert_eq!(path, PathBuf::from("dist/index.html"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    for ignored in ["/proj/src/css/app.css~", "/proj/README.md", "/elsewhere/a.css"] {
        assert!(process_file_change(&state, Path::new(ignored), &tx).await);
    }
    assert!(rx.try_recv().is_err(), "nothing else emitted");
    Ok(())
}

#[tokio::test]
async fn hashed_binding_skips_saves_that_change_nothing() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/css/app.css", ".a{}");
    let state = state(&fs, vec![css_binding(true)?]);
    seed_hashes(&state);
    let (tx, mut rx) = mpsc::channel(8);
    let path = Path::new("/proj/src/css/app.css");

    assert!(process_file_change(&state, path, &tx).await);
    assert!(rx.try_recv().is_err(), "same content, no rebuild");

    fs.add_file("/proj/src/css/app.css", ".a{color:blue}");
    assert!(process_file_change(&state, path, &tx).await);
    assert!(matches!(
        rx.try_recv()?,
        RuntimeEvent::TaskTriggered { ref task, .. } if task == "css"
    ));
    Ok(())
}

#[tokio::test]
async fn closed_runtime_channel_stops_processing() -> TestResult {
    let fs = MockFileSystem::new();
    let state = state(&fs, vec![css_binding(false)?]);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    assert!(!process_file_change(&state, Path::new("/proj/src/css/app.css"), &tx).await);
    Ok(())
}
