// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `pipedag`.
#[derive(Debug, Clone, Parser, Default)]
#[command(
    name = "pipedag",
    version,
    about = "Build file artifacts and run experiment matrices from a declarative pipeline.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    ///
    /// Relative paths inside the pipeline resolve against its directory.
    #[arg(long, short = 'c', value_name = "PATH", default_value = "Pipeline.toml")]
    pub config: String,

    /// Build every member of a target group (e.g. `prep`, `exp`). Repeatable.
    #[arg(long = "group", short = 'g', value_name = "NAME")]
    pub groups: Vec<String>,

    /// Print groups and their targets, then exit.
    #[arg(long)]
    pub list: bool,

    /// Print what would be built without running anything.
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Maximum number of actions running at once.
    ///
    /// Overrides `PIPEDAG_JOBS` and `[config].jobs`. Default: 1.
    #[arg(long, short = 'j', value_name = "N")]
    pub jobs: Option<usize>,

    /// Skip restricted datasets, commands and feature flags.
    ///
    /// Also enabled by `PIPEDAG_ONLY_PUBLIC` or `ONLY_PUBLIC`.
    #[arg(long)]
    pub only_public: bool,

    /// Value of `{queries}` (overrides `NUM_DIJKSTRA_QUERIES`).
    #[arg(long, value_name = "N")]
    pub queries: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Node ids or group names to build; `[config].default` when empty.
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
