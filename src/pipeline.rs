// src/pipeline.rs

//! Assembly of the rule graph from a validated pipeline file.

use std::path::Path;

use tracing::{debug, info};

use crate::config::model::{CommandConfig, ConfigFile, RuleConfig, RuleKind};
use crate::config::run::RunConfig;
use crate::dag::node::{canonical_id, Action, ArtifactNode, NodeId};
use crate::dag::{NamespaceRegistry, Registry};
use crate::dataset::{anchored, derived_nodes, DatasetDescriptor};
use crate::errors::{PipelineError, Result};
use crate::exec::{CommandSpec, Redirect};
use crate::matrix::template::{render, render_args, render_env, TemplateContext};
use crate::matrix::{expand, ExperimentVariant, OutputNamer};

/// Everything one run needs: the rule graph, its groups and default targets.
#[derive(Debug)]
pub struct Pipeline {
    pub registry: Registry,
    pub namespaces: NamespaceRegistry,
    pub defaults: Vec<String>,
    pub variants: Vec<ExperimentVariant>,
}

impl Pipeline {
    /// Populate the registry from static rules, datasets and matrices.
    ///
    /// Restricted datasets are left out entirely in public-only mode. The
    /// finished graph is checked for cycles before it is returned.
    pub fn build(cfg: &ConfigFile, run: &RunConfig, namer: &mut OutputNamer) -> Result<Self> {
        let mut registry = Registry::new();
        let mut namespaces = NamespaceRegistry::new();

        for rule in &cfg.rule {
            let node = rule_node(rule, run)?;
            if let Some(group) = &rule.group {
                namespaces.add(group, &node.id);
            }
            registry.register(node)?;
        }

        let datasets: Vec<DatasetDescriptor> = cfg
            .dataset
            .iter()
            .map(DatasetDescriptor::from)
            .filter(|d| d.is_public() || !run.public_only)
            .collect();

        for dataset in &datasets {
            let derived = derived_nodes(dataset, &cfg.derive, run)?;
            for node in derived.nodes {
                registry.register(node)?;
            }
            for target in &derived.targets {
                namespaces.add(&cfg.derive.group, target);
            }
        }

        let exp_dir = Path::new(&cfg.config.exp_dir);
        let mut variants = Vec::new();

        for matrix in &cfg.matrix {
            let expanded = expand(matrix, &datasets, run, exp_dir, namer)?;

            let mut aggregate = ArtifactNode::phony(&matrix.aggregate_id(), Action::None);
            if let Some(desc) = &matrix.desc {
                aggregate = aggregate.described(desc.clone());
            }

            for variant in &expanded {
                let category_dir = canonical_id(&format!("{}/{}", cfg.config.exp_dir, variant.category));
                registry.register(ArtifactNode::directory(&category_dir))?;

                let mut node = ArtifactNode::file(
                    &variant.output_path,
                    Action::Run(vec![variant.command.clone()]),
                );
                for req in &variant.requires {
                    node = node.depends_on(req);
                }
                node = node.depends_on(&category_dir);

                aggregate = aggregate.depends_on(&node.id);
                registry.register(node)?;
            }

            namespaces.add(&matrix.group, &aggregate.id);
            registry.register(aggregate)?;
            variants.extend(expanded);
        }

        registry.validate()?;

        info!(
            nodes = registry.len(),
            datasets = datasets.len(),
            variants = variants.len(),
            "pipeline assembled"
        );

        Ok(Self {
            registry,
            namespaces,
            defaults: cfg.config.default.clone(),
            variants,
        })
    }

    /// Turn requested targets and groups into node ids.
    ///
    /// A target is a registered node id or a group name (expanded to its
    /// members). With nothing requested the `[config].default` targets are
    /// used.
    pub fn resolve_targets(&self, targets: &[String], groups: &[String]) -> Result<Vec<NodeId>> {
        let mut resolved: Vec<NodeId> = Vec::new();
        let mut push = |id: NodeId| {
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        };

        let requested: Vec<&String> = if targets.is_empty() && groups.is_empty() {
            if self.defaults.is_empty() {
                return Err(PipelineError::ConfigError(
                    "no targets requested and [config].default is empty".to_string(),
                ));
            }
            self.defaults.iter().collect()
        } else {
            targets.iter().collect()
        };

        for target in requested {
            if let Some(node) = self.registry.get(target) {
                push(node.id.clone());
            } else if self.namespaces.contains_group(target) {
                for member in self.namespaces.members(target)? {
                    push(member.clone());
                }
            } else {
                return Err(PipelineError::UnknownTarget(canonical_id(target)));
            }
        }

        for group in groups {
            for member in self.namespaces.members(group)? {
                push(member.clone());
            }
        }

        debug!(targets = ?resolved, "targets resolved");
        Ok(resolved)
    }

    /// Human-readable listing of groups and their targets.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (group, members) in self.namespaces.groups() {
            out.push_str(group);
            out.push_str(":\n");
            for member in members {
                match self.registry.get(member).and_then(|n| n.description.as_deref()) {
                    Some(desc) => out.push_str(&format!("  {member:<48} # {desc}\n")),
                    None => out.push_str(&format!("  {member}\n")),
                }
            }
        }
        if !self.defaults.is_empty() {
            out.push_str(&format!("default: {}\n", self.defaults.join(", ")));
        }
        out
    }
}

fn rule_node(rule: &RuleConfig, run: &RunConfig) -> Result<ArtifactNode> {
    let mut node = match rule.kind {
        RuleKind::Directory => ArtifactNode::directory(&rule.id),
        RuleKind::File | RuleKind::Phony => {
            let action = match &rule.symlink {
                Some(target) => Action::Symlink {
                    target: target.into(),
                },
                None => {
                    let commands = rule
                        .command
                        .iter()
                        .filter(|c| c.enabled(run.public_only))
                        .map(|c| rule_command(&rule.id, c, run))
                        .collect::<Result<Vec<_>>>()?;
                    if commands.is_empty() {
                        Action::None
                    } else {
                        Action::Run(commands)
                    }
                }
            };
            if rule.kind == RuleKind::Phony {
                ArtifactNode::phony(&rule.id, action)
            } else {
                ArtifactNode::file(&rule.id, action)
            }
        }
    };

    let restricted: &[String] = if run.public_only {
        &[]
    } else {
        &rule.restricted_deps
    };
    for dep in rule.deps.iter().chain(restricted) {
        node = node.depends_on(dep);
    }
    for pattern in &rule.globs {
        node = node.depends_on_glob(pattern);
    }
    if let Some(desc) = &rule.desc {
        node = node.described(desc.clone());
    }
    Ok(node)
}

fn rule_command(id: &str, cfg: &CommandConfig, run: &RunConfig) -> Result<CommandSpec> {
    let root = run.root.to_string_lossy();
    let ctx = TemplateContext {
        queries: run.query_count,
        nproc: run.nproc,
        root: &root,
        ..Default::default()
    };

    let mut args = render_args(&cfg.args, &ctx).into_iter();
    let program = args.next().ok_or_else(|| {
        PipelineError::ConfigError(format!("rule '{id}' has a command without args"))
    })?;

    Ok(CommandSpec {
        program,
        args: args.collect(),
        env: render_env(&cfg.env, &ctx),
        cwd: cfg.cwd.as_ref().map(|dir| run.root.join(render(dir, &ctx))),
        stdout: cfg.stdout.as_ref().map(|path| Redirect {
            path: anchored(&run.root, &render(path, &ctx)).into(),
            append: cfg.append,
            header: cfg.header.as_ref().map(|h| render(h, &ctx)),
        }),
    })
}
