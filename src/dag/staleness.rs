// src/dag/staleness.rs

//! Staleness oracle: decides whether a node must be (re)built.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::SystemTime;

use tracing::trace;

use crate::dag::glob;
use crate::dag::node::{canonical_id, ArtifactNode, NodeId, NodeKind, Prerequisite};
use crate::dag::registry::Registry;
use crate::errors::{PipelineError, Result};
use crate::fs::FileSystem;

/// Make-style staleness checks over a [`Registry`] and a [`FileSystem`].
///
/// - Directory: dirty iff missing; never makes dependents dirty.
/// - Phony: always dirty.
/// - File: dirty iff missing, or a non-directory prerequisite is dirty, or a
///   prerequisite is strictly newer.
///
/// Decisions are memoized for the lifetime of the oracle (one run). The
/// scheduler asks in dependency order, so a prerequisite's verdict is
/// recorded before it is rebuilt and dependents see it as dirty.
pub struct StalenessOracle<'a> {
    registry: &'a Registry,
    fs: &'a dyn FileSystem,
    memo: HashMap<NodeId, bool>,
    in_progress: HashSet<NodeId>,
}

impl<'a> StalenessOracle<'a> {
    pub fn new(registry: &'a Registry, fs: &'a dyn FileSystem) -> Self {
        Self {
            registry,
            fs,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Whether the registered node `id` needs to be built.
    pub fn is_dirty(&mut self, id: &str) -> Result<bool> {
        let registry = self.registry;
        let node = registry.resolve(id)?;
        self.node_is_dirty(node)
    }

    fn node_is_dirty(&mut self, node: &'a ArtifactNode) -> Result<bool> {
        if let Some(&dirty) = self.memo.get(&node.id) {
            return Ok(dirty);
        }
        if !self.in_progress.insert(node.id.clone()) {
            return Err(PipelineError::CycleDetected(format!(
                "cycle reached while checking '{}'",
                node.id
            )));
        }

        let result = self.evaluate(node);
        self.in_progress.remove(&node.id);

        let dirty = result?;
        trace!(node = %node.id, dirty, "staleness decided");
        self.memo.insert(node.id.clone(), dirty);
        Ok(dirty)
    }

    fn evaluate(&mut self, node: &'a ArtifactNode) -> Result<bool> {
        match node.kind {
            NodeKind::Phony => Ok(true),
            NodeKind::Directory => Ok(!self.fs.is_dir(node.path())),
            NodeKind::File => self.file_is_dirty(node),
        }
    }

    fn file_is_dirty(&mut self, node: &'a ArtifactNode) -> Result<bool> {
        let own_mtime = match self.fs.modified(node.path())? {
            Some(t) => t,
            None => {
                // Still walk prerequisites so missing sources surface as errors.
                self.check_prerequisites(node, None)?;
                return Ok(true);
            }
        };

        self.check_prerequisites(node, Some(own_mtime))
    }

    /// Returns `true` if any prerequisite makes the node dirty.
    ///
    /// With `own_mtime == None` the node is already known to be dirty and this
    /// only validates that every prerequisite can be satisfied.
    fn check_prerequisites(
        &mut self,
        node: &'a ArtifactNode,
        own_mtime: Option<SystemTime>,
    ) -> Result<bool> {
        let mut dirty = own_mtime.is_none();

        for prereq in &node.prerequisites {
            match prereq {
                Prerequisite::Node(id) => {
                    if self.prerequisite_is_dirty(node, id, own_mtime)? {
                        dirty = true;
                    }
                }
                Prerequisite::Glob(pattern) => {
                    for path in glob::expand(self.fs, pattern)? {
                        if newer_than(self.fs.modified(&path)?, own_mtime) {
                            trace!(node = %node.id, prerequisite = ?path, "glob match is newer");
                            dirty = true;
                        }
                    }
                }
            }
        }

        Ok(dirty)
    }

    fn prerequisite_is_dirty(
        &mut self,
        node: &ArtifactNode,
        id: &str,
        own_mtime: Option<SystemTime>,
    ) -> Result<bool> {
        let registry = self.registry;
        let path = Path::new(id);

        match registry.get(id) {
            Some(prereq) if prereq.kind == NodeKind::Directory => {
                // Existence only; the scheduler creates it before we get here.
                self.node_is_dirty(prereq)?;
                Ok(false)
            }
            Some(prereq) => {
                if self.node_is_dirty(prereq)? {
                    return Ok(true);
                }
                if prereq.kind == NodeKind::Phony {
                    return Ok(false);
                }
                Ok(newer_than(self.fs.modified(path)?, own_mtime))
            }
            None => {
                // Plain source file: must exist, counts only through its mtime.
                let mtime = self.fs.modified(path)?;
                if mtime.is_none() {
                    return Err(PipelineError::MissingPrerequisite {
                        node: node.id.clone(),
                        prerequisite: canonical_id(id),
                    });
                }
                if self.fs.is_dir(path) {
                    return Ok(false);
                }
                Ok(newer_than(mtime, own_mtime))
            }
        }
    }
}

fn newer_than(prereq: Option<SystemTime>, own: Option<SystemTime>) -> bool {
    match (prereq, own) {
        (Some(p), Some(o)) => p > o,
        _ => false,
    }
}
