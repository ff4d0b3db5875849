// src/dag/node.rs

//! Artifact nodes: the vertices of the rule graph.

use std::path::{Path, PathBuf};

use crate::exec::CommandSpec;

/// Canonical node identifier: a filesystem path relative to the pipeline
/// root, or a synthetic name such as `exp:rphast` for phony nodes.
pub type NodeId = String;

/// Normalize a raw path/identifier into its canonical form.
///
/// - leading `./` components are dropped
/// - repeated separators are collapsed
/// - a trailing `/` is removed (`data/osm_ger/` == `data/osm_ger`)
pub fn canonical_id(raw: &str) -> NodeId {
    let trimmed = raw.trim();
    let absolute = trimmed.starts_with('/');
    let parts: Vec<&str> = trimmed
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Canonical id of a path.
pub fn path_id(path: &Path) -> NodeId {
    canonical_id(&path.to_string_lossy().replace('\\', "/"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A file artifact, rebuilt when missing or out of date.
    File,
    /// A directory, satisfied by existence alone.
    Directory,
    /// No on-disk artifact; always dirty when requested.
    Phony,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prerequisite {
    /// Another node (registered or a plain source file on disk).
    Node(NodeId),
    /// Every file matching the pattern when the dependent is evaluated.
    Glob(String),
}

impl Prerequisite {
    pub fn node(id: &str) -> Self {
        Prerequisite::Node(canonical_id(id))
    }

    pub fn glob(pattern: impl Into<String>) -> Self {
        Prerequisite::Glob(pattern.into())
    }

    pub fn as_node(&self) -> Option<&str> {
        match self {
            Prerequisite::Node(id) => Some(id),
            Prerequisite::Glob(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do (aggregate phony targets).
    None,
    /// Create the node's directory and any missing ancestors.
    CreateDir,
    /// Create the node's path as a symlink to `target`.
    ///
    /// Relative targets are interpreted from the link's directory.
    Symlink { target: PathBuf },
    /// Run external commands in order; the first failure fails the node.
    Run(Vec<CommandSpec>),
}

impl Action {
    /// Whether executing this action spawns external processes.
    pub fn is_external(&self) -> bool {
        matches!(self, Action::Run(cmds) if !cmds.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub prerequisites: Vec<Prerequisite>,
    pub action: Action,
    /// Optional human-readable description for `--list`.
    pub description: Option<String>,
}

impl ArtifactNode {
    pub fn file(id: &str, action: Action) -> Self {
        Self {
            id: canonical_id(id),
            kind: NodeKind::File,
            prerequisites: Vec::new(),
            action,
            description: None,
        }
    }

    pub fn directory(id: &str) -> Self {
        Self {
            id: canonical_id(id),
            kind: NodeKind::Directory,
            prerequisites: Vec::new(),
            action: Action::CreateDir,
            description: None,
        }
    }

    pub fn phony(id: &str, action: Action) -> Self {
        Self {
            id: canonical_id(id),
            kind: NodeKind::Phony,
            prerequisites: Vec::new(),
            action,
            description: None,
        }
    }

    pub fn depends_on(mut self, id: &str) -> Self {
        let prereq = Prerequisite::node(id);
        if !self.prerequisites.contains(&prereq) {
            self.prerequisites.push(prereq);
        }
        self
    }

    pub fn depends_on_glob(mut self, pattern: &str) -> Self {
        self.prerequisites.push(Prerequisite::glob(pattern));
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Node prerequisites (ignoring globs), in declaration order.
    pub fn node_prerequisites(&self) -> impl Iterator<Item = &str> {
        self.prerequisites.iter().filter_map(Prerequisite::as_node)
    }

    /// On-disk location of the artifact.
    pub fn path(&self) -> &Path {
        Path::new(&self.id)
    }
}
