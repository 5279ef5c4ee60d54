// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `assetflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetflow",
    version,
    about = "Build, watch and serve front-end assets.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Assetflow.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETFLOW_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Load and validate the config, print the resolved tasks, run nothing.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Run only these tasks (and whatever they depend on that has not been
    /// built yet). Repeatable. Default: every task.
    #[arg(long = "task", value_name = "NAME", global = true)]
    pub tasks: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build once, then serve the output and rebuild on change (default).
    Serve(ServeArgs),
    /// Build once and exit.
    Build,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Override `[server].port`.
    #[arg(long)]
    pub port: Option<u16>,
}

/// Resolved mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Serve { port: Option<u16> },
    Build,
}

impl CliArgs {
    pub fn mode(&self) -> Mode {
        match &self.command {
            None => Mode::Serve { port: None },
            Some(Command::Serve(args)) => Mode::Serve { port: args.port },
            Some(Command::Build) => Mode::Build,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
