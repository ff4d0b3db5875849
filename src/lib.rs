// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod dataset;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod matrix;
pub mod pipeline;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{config_root_dir, load_and_validate, EnvOverrides, RunConfig};
use crate::engine::Runtime;
use crate::errors::Result;
use crate::exec::ProcessExecutor;
use crate::fs::RealFileSystem;
use crate::matrix::OutputNamer;
use crate::pipeline::Pipeline;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline file loading and validation
/// - `RunConfig` from CLI flags and environment
/// - graph assembly (rules, datasets, matrices)
/// - target resolution and the runtime with the process executor
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    // Relative paths in the pipeline file are relative to its directory.
    let root = config_root_dir(&config_path)?;
    std::env::set_current_dir(&root)
        .with_context(|| format!("changing into pipeline directory {}", root.display()))?;
    debug!(root = %root.display(), "working directory set");

    let env = EnvOverrides::from_process()?;
    let run_config = RunConfig::resolve(&args, &cfg.config, &env, root)?;
    debug!(?run_config, "run configuration");

    let mut namer = OutputNamer::now();
    let pipeline = Pipeline::build(&cfg, &run_config, &mut namer)?;

    if args.list {
        print!("{}", pipeline.listing());
        return Ok(());
    }

    let targets = pipeline.resolve_targets(&args.targets, &args.groups)?;

    let runtime = Runtime::new(
        pipeline.registry,
        Arc::new(RealFileSystem),
        Arc::new(ProcessExecutor::new()),
        run_config,
    );
    let report = runtime.run(&targets).await?;

    info!(
        executed = report.executed.len(),
        up_to_date = report.skipped.len(),
        "done"
    );
    Ok(())
}
