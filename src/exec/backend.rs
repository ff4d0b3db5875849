// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime hands every external command to an `ExecutorBackend` instead
//! of spawning processes itself. Production uses [`ProcessExecutor`]; tests
//! substitute a fake that records invocations and writes the expected
//! artifacts into a mock filesystem.

use std::future::Future;
use std::pin::Pin;

use crate::dag::{NodeId, NodeKind};
use crate::engine::ActionOutcome;
use crate::errors::Result;
use crate::exec::command::CommandSpec;
use crate::exec::task_runner::run_command;

/// One command of one node's action, as handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafInvocation {
    pub node: NodeId,
    pub kind: NodeKind,
    pub command: CommandSpec,
}

/// Trait abstracting how leaf commands are executed.
pub trait ExecutorBackend: Send + Sync {
    /// Run one command to completion and report its outcome.
    ///
    /// An `Err` means the command could not be run at all (e.g. the program
    /// does not exist); a non-zero exit is `Ok(ActionOutcome::Failed(_))`.
    fn execute(
        &self,
        invocation: LeafInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<ActionOutcome>> + Send + '_>>;
}

/// Real executor backend: spawns OS processes via `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutorBackend for ProcessExecutor {
    fn execute(
        &self,
        invocation: LeafInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<ActionOutcome>> + Send + '_>> {
        Box::pin(async move {
            let outcome = run_command(&invocation.node, &invocation.command).await?;
            Ok(outcome)
        })
    }
}
