// src/dag/namespace.rs

use std::collections::BTreeMap;

use crate::dag::node::{canonical_id, NodeId};
use crate::errors::{PipelineError, Result};

/// Named groups of targets (`prep`, `exp`, `build`, ...).
///
/// Groups only select what to request; they add no edges to the rule graph.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    groups: BTreeMap<String, Vec<NodeId>>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to `group`, keeping first-insertion order.
    pub fn add(&mut self, group: &str, id: &str) {
        let id = canonical_id(id);
        let members = self.groups.entry(group.to_string()).or_default();
        if !members.contains(&id) {
            members.push(id);
        }
    }

    pub fn contains_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Members of a group, failing with `UnknownTarget` for unknown groups.
    pub fn members(&self, group: &str) -> Result<&[NodeId]> {
        self.groups
            .get(group)
            .map(|m| m.as_slice())
            .ok_or_else(|| PipelineError::UnknownTarget(format!("group '{group}'")))
    }

    /// Group names, sorted.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[NodeId])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
