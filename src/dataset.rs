// src/dataset.rs

//! Datasets and the artifacts derived from them.

use std::path::{Path, PathBuf};

use crate::config::model::{DatasetConfig, DeriveSection, ProgramConfig};
use crate::config::run::RunConfig;
use crate::dag::node::{canonical_id, Action, ArtifactNode, NodeId};
use crate::errors::{PipelineError, Result};
use crate::exec::CommandSpec;
use crate::matrix::template::{render, render_args, render_env, TemplateContext};
use crate::types::{TemporalClass, Visibility};

/// Files every imported graph provides.
pub const GRAPH_FILES: [&str; 11] = [
    "first_out",
    "head",
    "travel_time",
    "geo_distance",
    "osm_node_ids",
    "arc_category",
    "forbidden_turn_from_arc",
    "forbidden_turn_to_arc",
    "latitude",
    "longitude",
    "tail",
];

pub const TRAVEL_TIME: &str = "travel_time";
pub const LOWER_BOUND: &str = "lower_bound";
pub const LOWER_BOUND_CH: &str = "lower_bound_ch";
pub const CCH_PERM: &str = "cch_perm";

/// Outputs of the contraction hierarchy builder, in argument order.
pub const CH_FILES: [&str; 7] = [
    "order",
    "forward_first_out",
    "forward_head",
    "forward_weight",
    "backward_first_out",
    "backward_head",
    "backward_weight",
];

/// A graph dataset, immutable once declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub name: String,
    /// Canonical root directory.
    pub path: NodeId,
    pub visibility: Visibility,
    pub temporal: TemporalClass,
    /// Nodes producing the dataset's files.
    pub deps: Vec<NodeId>,
}

impl From<&DatasetConfig> for DatasetDescriptor {
    fn from(cfg: &DatasetConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            path: canonical_id(&cfg.path),
            visibility: cfg.visibility,
            temporal: cfg.temporal,
            deps: cfg.deps.iter().map(|d| canonical_id(d)).collect(),
        }
    }
}

impl DatasetDescriptor {
    /// Id of a file inside the dataset root.
    pub fn file(&self, name: &str) -> NodeId {
        canonical_id(&format!("{}/{}", self.path, name))
    }

    pub fn lower_bound(&self) -> NodeId {
        self.file(LOWER_BOUND)
    }

    pub fn lower_bound_ch_dir(&self) -> NodeId {
        self.file(LOWER_BOUND_CH)
    }

    pub fn ch_file(&self, name: &str) -> NodeId {
        self.file(&format!("{LOWER_BOUND_CH}/{name}"))
    }

    pub fn cch_perm(&self) -> NodeId {
        self.file(CCH_PERM)
    }

    /// Phony alias for the contraction hierarchy.
    pub fn lower_bound_ch_alias(&self, group: &str) -> NodeId {
        format!("{group}:{LOWER_BOUND_CH}:{}", self.name)
    }

    /// Value of `{dataset}` in commands: the root, anchored at `root`, with a
    /// trailing slash.
    pub fn rendered_path(&self, root: &Path) -> String {
        format!("{}/", anchored(root, &self.path))
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// `path` relative to `root` as a string; absolute paths pass through.
pub(crate) fn anchored(root: &Path, path: &str) -> String {
    let joined: PathBuf = root.join(path);
    joined.to_string_lossy().into_owned()
}

/// Nodes derived from a dataset and the targets worth grouping.
#[derive(Debug, Default)]
pub struct DerivedNodes {
    pub nodes: Vec<ArtifactNode>,
    /// Targets to add to the derive group.
    pub targets: Vec<NodeId>,
}

/// Build the `lower_bound`, `lower_bound_ch` and `cch_perm` rules for one
/// dataset.
pub fn derived_nodes(
    dataset: &DatasetDescriptor,
    derive: &DeriveSection,
    run: &RunConfig,
) -> Result<DerivedNodes> {
    let mut out = DerivedNodes::default();

    let lower_bound = lower_bound_node(dataset, derive, run)?;
    out.targets.push(lower_bound.id.clone());
    out.nodes.push(lower_bound);

    if let Some(builder) = &derive.ch_builder {
        let dir = ArtifactNode::directory(&dataset.lower_bound_ch_dir());

        let mut inputs: Vec<String> = ["first_out", "head", LOWER_BOUND]
            .iter()
            .map(|f| anchored(&run.root, &dataset.file(f)))
            .collect();
        inputs.extend(
            CH_FILES
                .iter()
                .map(|f| anchored(&run.root, &dataset.ch_file(f))),
        );

        let command = program_command(builder, dataset, run)?.args(inputs);
        let mut order = ArtifactNode::file(&dataset.ch_file("order"), Action::Run(vec![command]))
            .described(format!("contraction hierarchy of {}", dataset.name));
        for dep in &builder.deps {
            order = order.depends_on(dep);
        }
        order = order
            .depends_on(&dataset.file("first_out"))
            .depends_on(&dataset.file("head"))
            .depends_on(&dataset.lower_bound())
            .depends_on(&dir.id);

        let alias = ArtifactNode::phony(&dataset.lower_bound_ch_alias(&derive.group), Action::None)
            .depends_on(&order.id)
            .described(format!("contraction hierarchy of {}", dataset.name));

        out.targets.push(alias.id.clone());
        out.nodes.push(dir);
        out.nodes.push(order);
        out.nodes.push(alias);
    }

    if let Some(program) = &derive.cch_order {
        let command = program_command(program, dataset, run)?;
        let mut perm = ArtifactNode::file(&dataset.cch_perm(), Action::Run(vec![command]))
            .described(format!("nested dissection order of {}", dataset.name));
        for dep in program.deps.iter().chain(dataset.deps.iter()) {
            perm = perm.depends_on(dep);
        }
        out.targets.push(perm.id.clone());
        out.nodes.push(perm);
    }

    Ok(out)
}

fn lower_bound_node(
    dataset: &DatasetDescriptor,
    derive: &DeriveSection,
    run: &RunConfig,
) -> Result<ArtifactNode> {
    let id = dataset.lower_bound();
    let mut node = match dataset.temporal {
        TemporalClass::Static => ArtifactNode::file(
            &id,
            Action::Symlink {
                target: PathBuf::from(TRAVEL_TIME),
            },
        )
        .depends_on(&dataset.file(TRAVEL_TIME)),
        TemporalClass::TimeDependent => {
            let program = derive.td_lower_bound.as_ref().ok_or_else(|| {
                PipelineError::ConfigError(format!(
                    "dataset '{}' is time-dependent but [derive].td_lower_bound is not set",
                    dataset.name
                ))
            })?;
            let command = program_command(program, dataset, run)?;
            let mut node = ArtifactNode::file(&id, Action::Run(vec![command]))
                .depends_on(&dataset.file("first_out"))
                .depends_on(&dataset.file("head"));
            for dep in &program.deps {
                node = node.depends_on(dep);
            }
            node
        }
    };

    // Dataset producers come first so the graph files exist before use.
    let mut prereqs: Vec<NodeId> = dataset.deps.clone();
    prereqs.extend(node.node_prerequisites().map(str::to_string));
    node.prerequisites.clear();
    for dep in prereqs {
        node = node.depends_on(&dep);
    }

    Ok(node.described(format!("lower bound weights of {}", dataset.name)))
}

fn program_command(
    program: &ProgramConfig,
    dataset: &DatasetDescriptor,
    run: &RunConfig,
) -> Result<CommandSpec> {
    let root = run.root.to_string_lossy();
    let dataset_path = dataset.rendered_path(&run.root);
    let ctx = TemplateContext {
        dataset: Some(&dataset_path),
        queries: run.query_count,
        nproc: run.nproc,
        root: &root,
        ..Default::default()
    };

    let mut rendered = render_args(&program.args, &ctx).into_iter();
    let program_name = rendered.next().ok_or_else(|| {
        PipelineError::ConfigError("derive program has an empty `args` list".to_string())
    })?;

    let mut command = CommandSpec::new(program_name).args(rendered);
    command.env = render_env(&program.env, &ctx);
    if let Some(cwd) = &program.cwd {
        command.cwd = Some(run.root.join(render(cwd, &ctx)));
    }
    Ok(command)
}
