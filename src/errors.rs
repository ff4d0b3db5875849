// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::dag::NodeId;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown target: {0}")]
    UnknownTarget(NodeId),

    #[error("Duplicate rule for '{0}' with a different definition")]
    DuplicateRule(NodeId),

    #[error("Cycle detected in rule graph: {0}")]
    CycleDetected(String),

    #[error("Missing prerequisite '{prerequisite}' of '{node}' (no rule produces it)")]
    MissingPrerequisite {
        node: NodeId,
        prerequisite: String,
    },

    #[error("Action for '{node}' failed with exit status {status}")]
    ActionFailed { node: NodeId, status: i32 },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Process exit status the CLI should report for this error.
    ///
    /// Leaf action failures propagate the child's status; everything else is 1.
    pub fn exit_status(&self) -> i32 {
        match self {
            PipelineError::ActionFailed { status, .. } if *status > 0 && *status < 256 => *status,
            _ => 1,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;
