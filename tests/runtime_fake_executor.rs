use std::error::Error;
use std::sync::{Arc, Mutex};

use assetflow::config::ConfigFile;
use assetflow::dag::Scheduler;
use assetflow::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use assetflow::server::{ReloadHub, ReloadKind};
use assetflow::types::{AssetClass, TriggerWhileRunningBehaviour};
use assetflow_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use assetflow_test_utils::fake_executor::FakeExecutor;
use assetflow_test_utils::{init_tracing, with_timeout};
use tokio::sync::{mpsc, oneshot};

type TestResult = Result<(), Box<dyn Error>>;

fn site() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task("css", TaskConfigBuilder::asset(AssetClass::Styles).build())
        .with_task("js", TaskConfigBuilder::asset(AssetClass::Scripts).build())
        .with_task(
            "build",
            TaskConfigBuilder::aggregate().after("css").after("js").build(),
        )
        .build()
}

fn core_for(cfg: &ConfigFile, exit_when_idle: bool) -> CoreRuntime {
    CoreRuntime::new(
        Scheduler::from_config(cfg),
        TriggerWhileRunningBehaviour::Queue,
        cfg.config().queue_length,
        RuntimeOptions { exit_when_idle },
    )
}

#[tokio::test]
async fn build_mode_runs_dependencies_first_and_exits() -> TestResult {
    init_tracing();

    let cfg = site();
    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));

    let runtime = Runtime::new(core_for(&cfg, true), rx, executor)
        .with_initial_tasks(vec!["build".to_string()]);
    let summary = with_timeout(runtime.run()).await?;

    let executed = executed.lock().unwrap().clone();
    assert_eq!(executed.len(), 3);
    assert_eq!(executed.last().map(String::as_str), Some("build"));
    assert!(summary.is_success());
    assert_eq!(summary.succeeded.len(), 3);
    Ok(())
}

#[tokio::test]
async fn build_mode_reports_failure_and_skips_dependents() -> TestResult {
    init_tracing();

    let cfg = site();
    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed)).failing("css");

    let runtime = Runtime::new(core_for(&cfg, true), rx, executor)
        .with_initial_tasks(vec!["build".to_string()]);
    let summary = with_timeout(runtime.run()).await?;

    let executed = executed.lock().unwrap().clone();
    assert!(!executed.contains(&"build".to_string()));
    assert!(executed.contains(&"js".to_string()), "sibling still runs");
    assert!(!summary.is_success());
    assert!(summary.failed.contains(&"css".to_string()));
    assert!(summary.failed.contains(&"build".to_string()));
    assert_eq!(summary.succeeded, vec!["js".to_string()]);
    Ok(())
}

#[tokio::test]
async fn serve_mode_rebuilds_on_trigger_and_broadcasts_reload() -> TestResult {
    init_tracing();

    let cfg = site();
    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));

    let hub = ReloadHub::default();
    let mut browser = hub.subscribe();

    let runtime = Runtime::new(core_for(&cfg, false), rx, executor)
        .with_initial_tasks(vec!["css".to_string()])
        .with_reload_hub(hub);
    let handle = tokio::spawn(runtime.run());

    tx.send(RuntimeEvent::TaskTriggered {
        task: "css".to_string(),
        reason: TriggerReason::FileWatch,
    })
    .await?;

    let kind = with_timeout(browser.recv()).await?;
    assert_eq!(kind, ReloadKind::Styles);

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    let summary = with_timeout(handle).await??;

    assert_eq!(summary.succeeded, vec!["css".to_string(), "css".to_string()]);
    assert_eq!(*executed.lock().unwrap(), vec!["css", "css"]);
    Ok(())
}

#[tokio::test]
async fn ready_fires_only_after_the_initial_run_completes() -> TestResult {
    init_tracing();

    let cfg = site();
    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));
    let (ready_tx, ready_rx) = oneshot::channel();

    let runtime = Runtime::new(core_for(&cfg, false), rx, executor)
        .with_initial_tasks(vec!["build".to_string()])
        .with_ready_signal(ready_tx);
    let handle = tokio::spawn(runtime.run());

    with_timeout(ready_rx).await?;
    assert_eq!(executed.lock().unwrap().len(), 3, "whole initial run done before ready");

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    let summary = with_timeout(handle).await??;
    assert!(summary.is_success());
    Ok(())
}

#[tokio::test]
async fn ready_is_dropped_when_shutdown_interrupts_the_initial_run() -> TestResult {
    init_tracing();

    let cfg = site();
    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));
    let (ready_tx, ready_rx) = oneshot::channel();

    // Queued ahead of the completions the executor reports.
    tx.send(RuntimeEvent::ShutdownRequested).await?;
    let runtime = Runtime::new(core_for(&cfg, false), rx, executor)
        .with_initial_tasks(vec!["build".to_string()])
        .with_ready_signal(ready_tx);
    with_timeout(runtime.run()).await?;

    assert!(with_timeout(ready_rx).await.is_err());
    Ok(())
}

#[tokio::test]
async fn shutdown_before_any_work_returns_empty_summary() -> TestResult {
    init_tracing();

    let cfg = site();
    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    let runtime = Runtime::new(core_for(&cfg, false), rx, executor);
    let summary = with_timeout(runtime.run()).await?;

    assert!(summary.succeeded.is_empty());
    assert!(summary.is_success());
    assert!(executed.lock().unwrap().is_empty());
    Ok(())
}
