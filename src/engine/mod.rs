// src/engine/mod.rs

//! Execution engine for pipedag.
//!
//! The [`runtime`] walks a planned set of nodes in dependency order, asks the
//! staleness oracle about each one and runs the actions of dirty nodes,
//! either one at a time or with bounded parallelism.

use crate::dag::NodeId;

/// Outcome of one external command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Success,
    Failed(i32), // exit code, -1 if killed by a signal
}

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Nodes whose action ran (or, in a dry run, would run), in completion order.
    pub executed: Vec<NodeId>,
    /// Nodes found up to date.
    pub skipped: Vec<NodeId>,
}

pub mod runtime;

pub use runtime::Runtime;
