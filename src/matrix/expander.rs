// src/matrix/expander.rs

//! Expansion of a matrix declaration into concrete experiment variants.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{CommandConfig, MatrixConfig};
use crate::config::run::RunConfig;
use crate::dag::node::{canonical_id, path_id, NodeId};
use crate::dataset::{anchored, DatasetDescriptor};
use crate::errors::{PipelineError, Result};
use crate::exec::{CommandSpec, Redirect};
use crate::matrix::axes::{feature_combinations, FeatureSet, Guard};
use crate::matrix::naming::OutputNamer;
use crate::matrix::template::{render, render_args, render_env, TemplateContext};

/// One concrete experiment run: one output file, one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentVariant {
    pub matrix: String,
    pub dataset: String,
    pub features: FeatureSet,
    /// 0-based repetition index.
    pub repetition: usize,
    pub category: String,
    /// Canonical id of the output file.
    pub output_path: NodeId,
    pub command: CommandSpec,
    /// Rendered prerequisites for this dataset.
    pub requires: Vec<NodeId>,
}

/// Expand `spec` over `datasets`.
///
/// Nesting order (outermost first): datasets in declaration order,
/// repetitions, commands in declaration order, then the feature-axis product.
/// Guards and public-only filtering drop variants; the remaining ones each
/// get a fresh output path from `namer`.
pub fn expand(
    spec: &MatrixConfig,
    datasets: &[DatasetDescriptor],
    run: &RunConfig,
    exp_dir: &Path,
    namer: &mut OutputNamer,
) -> Result<Vec<ExperimentVariant>> {
    if spec.restricted && run.public_only {
        debug!(matrix = %spec.name, "restricted matrix skipped in public-only mode");
        return Ok(Vec::new());
    }

    let guards: Vec<Guard> = spec.guards.iter().flat_map(|g| g.to_guards()).collect();
    let combinations: Vec<FeatureSet> = feature_combinations(&spec.features)
        .into_iter()
        .filter(|features| guards.iter().all(|g| g.admits(features)))
        .filter(|features| !(run.public_only && features.contains_any(&spec.restricted_features)))
        .collect();

    let mut variants = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();

    for dataset in selected_datasets(spec, datasets, run) {
        let requires = rendered_requires(spec, dataset, run);

        for repetition in 0..spec.repeat {
            for command in &spec.command {
                if !command_applies(command, dataset, run) {
                    continue;
                }
                let category = command.category.as_deref().unwrap_or(spec.category());
                let extension = command.extension.as_deref().unwrap_or(&spec.extension);

                for features in &combinations {
                    let output = path_id(&namer.next_path(exp_dir, category, extension));
                    if !seen.insert(output.clone()) {
                        return Err(PipelineError::ConfigError(format!(
                            "matrix '{}' generated output path '{}' twice",
                            spec.name, output
                        )));
                    }

                    let command = render_command(spec, command, dataset, features, &output, run)?;
                    variants.push(ExperimentVariant {
                        matrix: spec.name.clone(),
                        dataset: dataset.name.clone(),
                        features: features.clone(),
                        repetition,
                        category: category.to_string(),
                        output_path: output,
                        command,
                        requires: requires.clone(),
                    });
                }
            }
        }
    }

    debug!(matrix = %spec.name, variants = variants.len(), "matrix expanded");
    Ok(variants)
}

fn selected_datasets<'a>(
    spec: &'a MatrixConfig,
    datasets: &'a [DatasetDescriptor],
    run: &'a RunConfig,
) -> impl Iterator<Item = &'a DatasetDescriptor> + 'a {
    datasets.iter().filter(move |d| {
        let listed = spec
            .datasets
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| *n == d.name));
        let temporal = spec.temporal.map_or(true, |t| t == d.temporal);
        listed && temporal && (d.is_public() || !run.public_only)
    })
}

fn command_applies(command: &CommandConfig, dataset: &DatasetDescriptor, run: &RunConfig) -> bool {
    let listed = command
        .datasets
        .as_ref()
        .map_or(true, |names| names.iter().any(|n| *n == dataset.name));
    let temporal = command.temporal.map_or(true, |t| t == dataset.temporal);
    listed && temporal && command.enabled(run.public_only)
}

fn rendered_requires(spec: &MatrixConfig, dataset: &DatasetDescriptor, run: &RunConfig) -> Vec<NodeId> {
    let ctx = TemplateContext {
        dataset: Some(&dataset.path),
        queries: run.query_count,
        nproc: run.nproc,
        ..Default::default()
    };
    let restricted = if run.public_only {
        &[][..]
    } else {
        spec.restricted_requires.as_slice()
    };
    spec.requires
        .iter()
        .chain(restricted)
        .map(|r| canonical_id(&render(r, &ctx)))
        .collect()
}

fn render_command(
    spec: &MatrixConfig,
    command: &CommandConfig,
    dataset: &DatasetDescriptor,
    features: &FeatureSet,
    output: &str,
    run: &RunConfig,
) -> Result<CommandSpec> {
    let root = run.root.to_string_lossy();
    let dataset_path = dataset.rendered_path(&run.root);
    let output_path = anchored(&run.root, output);
    let ctx = TemplateContext {
        dataset: Some(&dataset_path),
        features: Some(features),
        output: Some(&output_path),
        queries: run.query_count,
        nproc: run.nproc,
        root: &root,
    };

    let mut args = render_args(&command.args, &ctx).into_iter();
    let program = args.next().ok_or_else(|| {
        PipelineError::ConfigError(format!("matrix '{}' has a command without args", spec.name))
    })?;

    let mut env = render_env(&spec.env, &ctx);
    for conditional in &spec.env_when {
        if conditional.applies_to(features) {
            env.extend(render_env(&conditional.env, &ctx));
        }
    }
    env.extend(render_env(&command.env, &ctx));

    let cwd = command
        .cwd
        .as_ref()
        .or(spec.cwd.as_ref())
        .map(|dir| run.root.join(render(dir, &ctx)));

    let stdout_path = match &command.stdout {
        Some(path) => PathBuf::from(anchored(&run.root, &render(path, &ctx))),
        None => PathBuf::from(output_path.clone()),
    };

    Ok(CommandSpec {
        program,
        args: args.collect(),
        env,
        cwd,
        stdout: Some(Redirect {
            path: stdout_path,
            append: command.append,
            header: command.header.as_ref().map(|h| render(h, &ctx)),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::DatasetConfig;
    use crate::matrix::axes::GuardConfig;
    use crate::types::{TemporalClass, Visibility};

    fn dataset(name: &str, visibility: Visibility) -> DatasetDescriptor {
        DatasetDescriptor::from(&DatasetConfig {
            name: name.into(),
            path: format!("data/{name}/"),
            visibility,
            temporal: TemporalClass::Static,
            deps: vec![],
        })
    }

    fn flags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn matrix() -> MatrixConfig {
        MatrixConfig {
            name: "bidir_features".into(),
            group: "exp".into(),
            category: None,
            extension: "json".into(),
            datasets: None,
            temporal: None,
            requires: vec!["{dataset}/lower_bound_ch/order".into()],
            restricted_requires: vec![],
            cwd: Some("code/rust_road_router".into()),
            env: Default::default(),
            env_when: vec![],
            repeat: 1,
            features: vec![
                vec![flags(&[]), flags(&["chpot-improved-pruning"])],
                vec![flags(&[]), flags(&["chpot-alt"]), flags(&["chpot-oracle"])],
            ],
            guards: vec![],
            restricted_features: vec![],
            restricted: false,
            desc: None,
            command: vec![CommandConfig {
                args: flags(&["cargo", "run", "--bin", "chpot_bidir", "{features}", "--", "{dataset}"]),
                ..CommandConfig::default()
            }],
        }
    }

    #[test]
    fn product_size_and_unique_paths() {
        let datasets = vec![dataset("a", Visibility::Public), dataset("b", Visibility::Public)];
        let mut namer = OutputNamer::with_stamp("t");
        let variants = expand(&matrix(), &datasets, &RunConfig::default(), Path::new("exp"), &mut namer).unwrap();

        assert_eq!(variants.len(), 2 * 2 * 3);
        let paths: HashSet<_> = variants.iter().map(|v| v.output_path.clone()).collect();
        assert_eq!(paths.len(), variants.len());
        assert_eq!(variants[0].dataset, "a");
        assert_eq!(variants[6].dataset, "b");
        assert_eq!(variants[0].requires, vec!["data/a/lower_bound_ch/order"]);
        assert_eq!(
            variants[4].command.args,
            flags(&["run", "--bin", "chpot_bidir", "--features", "chpot-improved-pruning chpot-alt", "--", "data/a/"])
        );
        assert_eq!(variants[4].command.cwd, Some(PathBuf::from("code/rust_road_router")));
        assert_eq!(
            variants[4].command.stdout.as_ref().unwrap().path,
            PathBuf::from(&variants[4].output_path)
        );
    }

    #[test]
    fn guards_and_public_filter_drop_variants() {
        let mut spec = matrix();
        spec.guards = vec![GuardConfig {
            flag: "chpot-improved-pruning".into(),
            requires: vec![],
            excludes: flags(&["chpot-oracle"]),
        }];
        spec.restricted_features = flags(&["chpot-alt"]);

        let datasets = vec![dataset("a", Visibility::Public), dataset("secret", Visibility::Restricted)];
        let run = RunConfig {
            public_only: true,
            ..RunConfig::default()
        };
        let mut namer = OutputNamer::with_stamp("t");
        let variants = expand(&spec, &datasets, &run, Path::new("exp"), &mut namer).unwrap();

        // 6 combinations - 1 guarded - 2 restricted, on the public dataset only.
        assert_eq!(variants.len(), 3);
        assert!(variants.iter().all(|v| v.dataset == "a"));
        assert!(variants.iter().all(|v| !v.features.contains("chpot-alt")));
    }

    #[test]
    fn conditional_env_applies_to_matching_features() {
        let mut spec = matrix();
        spec.env_when = vec![crate::matrix::axes::ConditionalEnv {
            flags: flags(&["chpot-oracle"]),
            env: [("CHPOT_NUM_QUERIES".to_string(), "{queries}".to_string())].into(),
        }];
        let run = RunConfig {
            query_count: 42,
            ..RunConfig::default()
        };
        let mut namer = OutputNamer::with_stamp("t");
        let variants = expand(&spec, &[dataset("a", Visibility::Public)], &run, Path::new("exp"), &mut namer).unwrap();
        for v in &variants {
            let expected = v.features.contains("chpot-oracle");
            assert_eq!(v.command.env.get("CHPOT_NUM_QUERIES").is_some(), expected);
        }
        assert_eq!(variants[2].command.env["CHPOT_NUM_QUERIES"], "42");
    }

    #[test]
    fn repetitions_and_commands_nest_inside_datasets() {
        let mut spec = matrix();
        spec.features = vec![];
        spec.repeat = 2;
        spec.command.push(CommandConfig {
            args: flags(&["flow_cutter_cch_order.sh", "{dataset}", "1"]),
            category: Some("preprocessing/cch".into()),
            extension: Some("out".into()),
            header: Some("{dataset}".into()),
            append: true,
            ..CommandConfig::default()
        });
        let mut namer = OutputNamer::with_stamp("t");
        let variants = expand(&spec, &[dataset("a", Visibility::Public)], &RunConfig::default(), Path::new("exp"), &mut namer).unwrap();

        let shape: Vec<(usize, &str)> = variants.iter().map(|v| (v.repetition, v.category.as_str())).collect();
        assert_eq!(
            shape,
            vec![
                (0, "bidir_features"),
                (0, "preprocessing/cch"),
                (1, "bidir_features"),
                (1, "preprocessing/cch"),
            ]
        );
        let redirect = variants[1].command.stdout.as_ref().unwrap();
        assert!(redirect.append);
        assert_eq!(redirect.header.as_deref(), Some("data/a/"));
        assert!(variants[1].output_path.ends_with(".out"));
    }
}
