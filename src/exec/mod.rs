// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] holds the typed command descriptors built by the pipeline.
//! - [`task_runner`] spawns one command with `tokio::process::Command`.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `ProcessExecutor`; tests replace it with a fake implementation.

pub mod backend;
pub mod command;
pub mod task_runner;

pub use backend::{ExecutorBackend, LeafInvocation, ProcessExecutor};
pub use command::{CommandSpec, Redirect};
