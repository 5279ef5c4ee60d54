// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::cli::{CliArgs, Mode};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::Scheduler;
use crate::engine::{CoreRuntime, RunSummary, Runtime, RuntimeEvent, RuntimeOptions, TaskName};
use crate::errors::AssetflowError;
use crate::exec::RealExecutorBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::TracingSink;
use crate::registry::TaskRegistry;
use crate::server::{ReloadHub, ServerHandle};
use crate::watch::WatcherHandle;

/// High-level entry point used by `main.rs`.
///
/// Loads the config, then either builds the requested tasks once (`build`)
/// or builds them, serves the output and rebuilds on change until Ctrl-C
/// (`serve`).
pub async fn run(args: CliArgs) -> Result<RunSummary> {
    let config_path = PathBuf::from(&args.config);
    let cfg = Arc::new(load_and_validate(&config_path)?);
    let root = config_root_dir(&config_path);
    let tasks = requested_tasks(&cfg, &args.tasks)?;
    let mode = args.mode();

    if args.dry_run {
        print_dry_run(&cfg, &tasks, mode);
        return Ok(RunSummary::default());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let registry = Arc::new(TaskRegistry::new(
        Arc::clone(&cfg),
        root.clone(),
        Arc::clone(&fs),
        Arc::new(TracingSink),
    ));

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(256);
    let executor = RealExecutorBackend::new(registry, rt_tx.clone());

    let options = RuntimeOptions {
        exit_when_idle: mode == Mode::Build,
    };
    let core = CoreRuntime::new(
        Scheduler::from_config(&cfg),
        cfg.config().triggered_while_running_behaviour,
        cfg.config().queue_length,
        options,
    );
    let mut runtime = Runtime::new(core, rt_rx, executor).with_initial_tasks(tasks);

    // Serving and watching begin once the initial build has finished.
    let mut serve = None;
    if let Mode::Serve { port } = mode {
        let (ready_tx, ready_rx) = oneshot::channel();
        let hub = ReloadHub::default();
        runtime = runtime
            .with_reload_hub(hub.clone())
            .with_ready_signal(ready_tx);
        serve = Some((port, hub, ready_rx));
    }

    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let running = runtime.run();
    tokio::pin!(running);
    let mut surface = None;
    if let Some((port, hub, ready_rx)) = serve {
        let start = async {
            if ready_rx.await.is_err() {
                return Ok(None);
            }
            start_serving(&cfg, &root, port, hub, rt_tx.clone(), Arc::clone(&fs))
                .await
                .map(Some)
        };
        tokio::select! {
            summary = &mut running => return finish(summary?),
            started = start => surface = started?,
        }
    }
    drop(rt_tx);

    let summary = running.await?;
    if let Some((server, _watcher)) = surface {
        server.task.abort();
    }
    finish(summary)
}

/// Bind the dev server and start watching sources.
async fn start_serving(
    cfg: &ConfigFile,
    root: &Path,
    port: Option<u16>,
    hub: ReloadHub,
    rt_tx: mpsc::Sender<RuntimeEvent>,
    fs: Arc<dyn FileSystem>,
) -> Result<(ServerHandle, WatcherHandle)> {
    let mut server_cfg = cfg.server().clone();
    if let Some(port) = port {
        server_cfg.port = port;
    }
    let server_root = root.join(&server_cfg.root);
    let server = server::start(&server_cfg, server_root, hub).await?;

    let bindings = watch::build_bindings(cfg)?;
    let watcher = watch::spawn_watcher(root.to_path_buf(), bindings, rt_tx, fs)?;
    Ok((server, watcher))
}

fn finish(summary: RunSummary) -> Result<RunSummary> {
    if summary.is_success() {
        info!(succeeded = summary.succeeded.len(), "done");
    } else {
        error!(
            succeeded = summary.succeeded.len(),
            failed = ?summary.failed,
            "some tasks failed"
        );
    }
    Ok(summary)
}

/// Directory the config file lives in; relative paths resolve against it.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// The `--task` selection, or every configured task.
pub fn requested_tasks(cfg: &ConfigFile, selected: &[String]) -> errors::Result<Vec<TaskName>> {
    if selected.is_empty() {
        return Ok(cfg.tasks().keys().cloned().collect());
    }
    for name in selected {
        if cfg.task(name).is_none() {
            return Err(AssetflowError::TaskNotFound(name.clone()));
        }
    }
    Ok(selected.to_vec())
}

fn print_dry_run(cfg: &ConfigFile, tasks: &[TaskName], mode: Mode) {
    println!("assetflow dry-run ({mode:?})");
    println!(
        "  config.triggered_while_running_behaviour = {:?}",
        cfg.config().triggered_while_running_behaviour
    );
    println!("  config.queue_length = {}", cfg.config().queue_length);
    println!(
        "  project: src = {}, dist = {}",
        cfg.project().src,
        cfg.project().dist
    );
    println!();

    println!("assets:");
    for asset in cfg.assets() {
        println!("  - {}", asset.class);
        println!("      src: {:?}", asset.src);
        println!("      dest: {}", asset.dest);
        if asset.watch != asset.src {
            println!("      watch: {:?}", asset.watch);
        }
        if !asset.exclude.is_empty() {
            println!("      exclude: {:?}", asset.exclude);
        }
        let stages: Vec<&str> = asset.stages.iter().map(|s| s.as_str()).collect();
        println!("      stages: {}", stages.join(" -> "));
    }
    println!();

    println!("tasks ({}):", cfg.tasks().len());
    for (name, task) in cfg.tasks() {
        let marker = if tasks.contains(name) { "*" } else { " " };
        match task.asset {
            Some(class) => {
                let stages: Vec<&str> = task.stages.iter().map(|s| s.as_str()).collect();
                println!("  {marker} {name} [{class}]: {}", stages.join(" -> "));
            }
            None => println!("  {marker} {name} (aggregate)"),
        }
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if task.asset.is_some() && !task.watch {
            println!("      watch: false");
        }
        if task.use_hash {
            println!("      use_hash: true");
        }
    }

    if let Mode::Serve { port } = mode {
        let server = cfg.server();
        println!();
        println!(
            "server: http://{}:{}/ (root {})",
            server.host,
            port.unwrap_or(server.port),
            server.root
        );
        if !server.reload_on.is_empty() {
            println!("  reload_on: {:?}", server.reload_on);
        }
    }

    debug!("dry-run complete (no execution)");
}
