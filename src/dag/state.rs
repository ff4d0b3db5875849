// src/dag/state.rs

//! Per-run node state machine.

use std::collections::HashMap;

use anyhow::anyhow;

use crate::dag::node::NodeId;
use crate::errors::Result;

/// Lifecycle of a node within one run.
///
/// `Unvisited -> Evaluating -> {Skipped | Executing -> {Succeeded | Failed}}`
///
/// `Evaluating` doubles as the cycle marker during planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unvisited,
    Evaluating,
    Skipped,
    Executing,
    Succeeded,
    Failed,
}

impl NodeState {
    /// Terminal and successful: dependents may proceed.
    pub fn is_satisfied(self) -> bool {
        matches!(self, NodeState::Skipped | NodeState::Succeeded)
    }

    fn can_transition_to(self, next: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Unvisited, Evaluating)
                | (Evaluating, Skipped)
                | (Evaluating, Executing)
                | (Executing, Succeeded)
                | (Executing, Failed)
        )
    }
}

/// State table for every node that takes part in a run.
#[derive(Debug, Clone, Default)]
pub struct NodeStates {
    states: HashMap<NodeId, NodeState>,
}

impl NodeStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> NodeState {
        self.states.get(id).copied().unwrap_or(NodeState::Unvisited)
    }

    /// Move `id` to `next`, rejecting transitions the lifecycle forbids.
    pub fn transition(&mut self, id: &str, next: NodeState) -> Result<()> {
        let current = self.get(id);
        if !current.can_transition_to(next) {
            return Err(anyhow!(
                "illegal state transition for '{id}': {current:?} -> {next:?}"
            )
            .into());
        }
        self.states.insert(id.to_string(), next);
        Ok(())
    }

    /// Ids currently in `state`, in no particular order.
    pub fn in_state(&self, state: NodeState) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(move |(_, s)| **s == state)
            .map(|(id, _)| id.as_str())
    }
}
