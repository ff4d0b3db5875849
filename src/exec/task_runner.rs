// src/exec/task_runner.rs

//! Runs a single external command to completion.

use std::fs::OpenOptions;
use std::io::Write;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::engine::ActionOutcome;
use crate::exec::command::{CommandSpec, Redirect};

/// Spawn `spec`, wait for it and map its exit status.
///
/// Stdout is either inherited or sent to the redirect file; stderr is always
/// inherited so progress output of long experiments stays visible.
pub async fn run_command(node: &str, spec: &CommandSpec) -> Result<ActionOutcome> {
    info!(node = %node, program = %spec.program, "running: {spec}");

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }

    match &spec.stdout {
        Some(redirect) => {
            cmd.stdout(open_redirect(redirect)?);
        }
        None => {
            cmd.stdout(Stdio::inherit());
        }
    }

    let status = cmd
        .status()
        .await
        .with_context(|| format!("spawning '{}' for '{}'", spec.program, node))?;

    let code = status.code().unwrap_or(-1);
    debug!(node = %node, program = %spec.program, exit_code = code, "process exited");

    if status.success() {
        Ok(ActionOutcome::Success)
    } else {
        Ok(ActionOutcome::Failed(code))
    }
}

fn open_redirect(redirect: &Redirect) -> Result<Stdio> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(redirect.append)
        .truncate(!redirect.append)
        .open(&redirect.path)
        .with_context(|| format!("opening output file {:?}", redirect.path))?;

    if let Some(header) = &redirect.header {
        writeln!(file, "{header}")
            .with_context(|| format!("writing header to {:?}", redirect.path))?;
    }

    Ok(Stdio::from(file))
}
