// src/dag/mod.rs

//! Rule graph, staleness and planning.
//!
//! - [`node`] defines artifact nodes and their actions.
//! - [`registry`] stores the rule graph and rejects cycles.
//! - [`namespace`] groups targets under names selectable from the CLI.
//! - [`staleness`] decides which nodes are out of date.
//! - [`scheduler`] resolves targets into a topological plan.
//! - [`state`] tracks each node through one run.

pub mod glob;
pub mod namespace;
pub mod node;
pub mod registry;
pub mod scheduler;
pub mod staleness;
pub mod state;

pub use namespace::NamespaceRegistry;
pub use node::{canonical_id, path_id, Action, ArtifactNode, NodeId, NodeKind, Prerequisite};
pub use registry::Registry;
pub use scheduler::{Plan, Scheduler};
pub use staleness::StalenessOracle;
pub use state::{NodeState, NodeStates};
