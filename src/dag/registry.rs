// src/dag/registry.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::node::{canonical_id, ArtifactNode, NodeId};
use crate::errors::{PipelineError, Result};

/// In-memory rule graph keyed by canonical node id.
///
/// Nodes keep their declaration order, which the scheduler uses to break
/// ties deterministically. The registry never touches the filesystem.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    nodes: Vec<ArtifactNode>,
    index: HashMap<NodeId, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node.
    ///
    /// Registering an identical node twice is a no-op; registering a
    /// different rule under an existing id is a `DuplicateRule` error.
    pub fn register(&mut self, node: ArtifactNode) -> Result<()> {
        if let Some(&idx) = self.index.get(&node.id) {
            if self.nodes[idx] == node {
                debug!(node = %node.id, "identical rule registered twice; ignoring");
                return Ok(());
            }
            return Err(PipelineError::DuplicateRule(node.id));
        }

        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Look up a node, failing with `UnknownTarget` if it is not registered.
    pub fn resolve(&self, id: &str) -> Result<&ArtifactNode> {
        self.get(id)
            .ok_or_else(|| PipelineError::UnknownTarget(canonical_id(id)))
    }

    pub fn get(&self, id: &str) -> Option<&ArtifactNode> {
        let key = canonical_id(id);
        self.index.get(&key).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &ArtifactNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Reject cyclic rule graphs.
    ///
    /// Edge direction: prerequisite -> dependent. Prerequisites that are not
    /// registered are plain source files and cannot take part in a cycle.
    pub fn validate(&self) -> Result<()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for node in &self.nodes {
            graph.add_node(node.id.as_str());
        }

        for node in &self.nodes {
            for prereq in node.node_prerequisites() {
                if let Some(&idx) = self.index.get(prereq) {
                    graph.add_edge(self.nodes[idx].id.as_str(), node.id.as_str(), ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(PipelineError::CycleDetected(format!(
                "cycle in rule graph involving '{}'",
                cycle.node_id()
            ))),
        }
    }
}
