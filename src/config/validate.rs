// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{
    CommandConfig, ConfigFile, MatrixConfig, ProgramConfig, RawConfigFile, RuleConfig, RuleKind,
};
use crate::dag::glob;
use crate::dag::node::canonical_id;
use crate::errors::{PipelineError, Result};
use crate::matrix::template::{self, placeholders};
use crate::types::TemporalClass;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipelineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_datasets(cfg)?;
    validate_derive(cfg)?;
    validate_rules(cfg)?;
    validate_matrices(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> PipelineError {
    PipelineError::ConfigError(msg.into())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.jobs == Some(0) {
        return Err(config_error("[config].jobs must be >= 1 (got 0)"));
    }
    if cfg.config.exp_dir.trim().is_empty() {
        return Err(config_error("[config].exp_dir must not be empty"));
    }
    if cfg.config.default.iter().any(|t| t.trim().is_empty()) {
        return Err(config_error("[config].default contains an empty target"));
    }
    Ok(())
}

fn validate_datasets(cfg: &RawConfigFile) -> Result<()> {
    let mut names = HashSet::new();
    for dataset in &cfg.dataset {
        if dataset.name.trim().is_empty() {
            return Err(config_error("[[dataset]] entry with an empty name"));
        }
        if dataset.path.trim().is_empty() {
            return Err(config_error(format!(
                "dataset '{}' has an empty path",
                dataset.name
            )));
        }
        if !names.insert(dataset.name.as_str()) {
            return Err(config_error(format!(
                "dataset '{}' is declared more than once",
                dataset.name
            )));
        }
    }
    Ok(())
}

fn validate_derive(cfg: &RawConfigFile) -> Result<()> {
    let derive = &cfg.derive;
    let programs = [
        ("ch_builder", &derive.ch_builder),
        ("td_lower_bound", &derive.td_lower_bound),
        ("cch_order", &derive.cch_order),
    ];
    for (name, program) in programs {
        if let Some(program) = program {
            validate_program(name, program)?;
        }
    }

    let needs_td = cfg
        .dataset
        .iter()
        .find(|d| d.temporal == TemporalClass::TimeDependent);
    if let (Some(dataset), None) = (needs_td, &derive.td_lower_bound) {
        return Err(config_error(format!(
            "dataset '{}' is time-dependent but [derive].td_lower_bound is not set",
            dataset.name
        )));
    }
    Ok(())
}

fn validate_program(name: &str, program: &ProgramConfig) -> Result<()> {
    let what = format!("[derive].{name}");
    if program.args.is_empty() {
        return Err(config_error(format!("{what} has an empty `args` list")));
    }
    let allowed = [template::DATASET, template::QUERIES, template::NPROC, template::ROOT];
    check_templates(&what, program.args.iter(), &allowed)?;
    check_templates(&what, program.env.values(), &allowed)?;
    check_templates(&what, program.cwd.iter(), &allowed)?;
    Ok(())
}

fn validate_rules(cfg: &RawConfigFile) -> Result<()> {
    let mut ids = HashSet::new();
    for rule in &cfg.rule {
        let id = canonical_id(&rule.id);
        if rule.id.trim().is_empty() {
            return Err(config_error("[[rule]] entry with an empty id"));
        }
        if !ids.insert(id.clone()) {
            return Err(PipelineError::DuplicateRule(id));
        }
        validate_rule(&id, rule)?;
    }
    Ok(())
}

fn validate_rule(id: &str, rule: &RuleConfig) -> Result<()> {
    let what = format!("rule '{id}'");

    if rule.deps.iter().chain(&rule.restricted_deps).any(|d| canonical_id(d) == id) {
        return Err(config_error(format!("{what} cannot depend on itself")));
    }
    if rule.kind == RuleKind::Directory && (!rule.command.is_empty() || rule.symlink.is_some()) {
        return Err(config_error(format!(
            "{what} is a directory and cannot have commands or a symlink"
        )));
    }
    if rule.symlink.is_some() && !rule.command.is_empty() {
        return Err(config_error(format!(
            "{what} cannot have both a symlink and commands"
        )));
    }
    for pattern in &rule.globs {
        glob::compile(pattern).map_err(|e| config_error(format!("{what}: {e}")))?;
    }

    let allowed = [template::QUERIES, template::NPROC, template::ROOT];
    for command in &rule.command {
        if command.has_matrix_overrides() {
            return Err(config_error(format!(
                "{what}: `category`, `extension`, `datasets` and `temporal` are only valid in matrix commands"
            )));
        }
        validate_command(&what, command, &allowed)?;
    }
    Ok(())
}

fn validate_command(what: &str, command: &CommandConfig, allowed: &[&str]) -> Result<()> {
    if command.args.is_empty() {
        return Err(config_error(format!("{what} has a command with empty `args`")));
    }
    check_templates(what, command.args.iter(), allowed)?;
    check_templates(what, command.env.values(), allowed)?;
    check_templates(what, command.cwd.iter(), allowed)?;
    check_templates(what, command.stdout.iter(), allowed)?;
    check_templates(what, command.header.iter(), allowed)?;

    for arg in &command.args {
        if arg != "{features}" && arg.contains("{features}") {
            return Err(config_error(format!(
                "{what}: `{{features}}` must be a whole argument (got '{arg}')"
            )));
        }
    }
    Ok(())
}

fn check_templates<'a>(
    what: &str,
    values: impl Iterator<Item = &'a String>,
    allowed: &[&str],
) -> Result<()> {
    for value in values {
        for name in placeholders(value) {
            if !allowed.contains(&name) {
                return Err(config_error(format!(
                    "{what}: placeholder `{{{name}}}` is not available here (in '{value}')"
                )));
            }
        }
    }
    Ok(())
}

fn validate_matrices(cfg: &RawConfigFile) -> Result<()> {
    let datasets: HashSet<&str> = cfg.dataset.iter().map(|d| d.name.as_str()).collect();
    let mut names = HashSet::new();

    for matrix in &cfg.matrix {
        if matrix.name.trim().is_empty() {
            return Err(config_error("[[matrix]] entry with an empty name"));
        }
        if !names.insert(matrix.name.as_str()) {
            return Err(config_error(format!(
                "matrix '{}' is declared more than once",
                matrix.name
            )));
        }
        validate_matrix(matrix, &datasets)?;
    }
    Ok(())
}

fn validate_matrix(matrix: &MatrixConfig, datasets: &HashSet<&str>) -> Result<()> {
    let what = format!("matrix '{}'", matrix.name);

    if matrix.command.is_empty() {
        return Err(config_error(format!("{what} has no [[matrix.command]] entries")));
    }
    if matrix.repeat == 0 {
        return Err(config_error(format!("{what}: `repeat` must be >= 1")));
    }
    if matrix.extension.trim().is_empty() {
        return Err(config_error(format!("{what}: `extension` must not be empty")));
    }
    if datasets.is_empty() {
        return Err(config_error(format!("{what} needs at least one [[dataset]]")));
    }

    let listed = matrix
        .datasets
        .iter()
        .flatten()
        .chain(matrix.command.iter().filter_map(|c| c.datasets.as_ref()).flatten());
    for name in listed {
        if !datasets.contains(name.as_str()) {
            return Err(config_error(format!("{what} references unknown dataset '{name}'")));
        }
    }
    if matches!(&matrix.datasets, Some(list) if list.is_empty()) {
        return Err(config_error(format!("{what}: `datasets` must not be empty")));
    }

    for (i, axis) in matrix.features.iter().enumerate() {
        if axis.is_empty() {
            return Err(config_error(format!("{what}: feature axis {i} is empty")));
        }
    }
    let flags: HashSet<&str> = matrix
        .features
        .iter()
        .flatten()
        .flatten()
        .map(String::as_str)
        .collect();
    for guard in matrix.guards.iter().flat_map(|g| g.to_guards()) {
        if let Some(flag) = guard.flags().find(|f| !flags.contains(f)) {
            return Err(config_error(format!(
                "{what}: guard mentions '{flag}', which is on no feature axis"
            )));
        }
    }
    for conditional in &matrix.env_when {
        if conditional.flags.is_empty() {
            return Err(config_error(format!("{what}: `env_when` entry without flags")));
        }
    }

    let requires_allowed = [template::DATASET, template::QUERIES, template::NPROC];
    check_templates(
        &what,
        matrix.requires.iter().chain(&matrix.restricted_requires),
        &requires_allowed,
    )?;
    check_templates(&what, matrix.env.values(), template::ALL)?;
    check_templates(&what, matrix.cwd.iter(), template::ALL)?;
    for conditional in &matrix.env_when {
        check_templates(&what, conditional.env.values(), template::ALL)?;
    }
    for command in &matrix.command {
        validate_command(&what, command, template::ALL)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn accepts_minimal_pipeline() {
        let cfg = parse(
            r#"
            [[rule]]
            id = "out.txt"
            deps = ["in.txt"]
            [[rule.command]]
            args = ["cp", "in.txt", "out.txt"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.rule.len(), 1);
        assert_eq!(cfg.config.exp_dir, "exp");
    }

    #[test]
    fn rejects_placeholder_outside_its_context() {
        let err = parse(
            r#"
            [[rule]]
            id = "out.txt"
            [[rule.command]]
            args = ["tool", "{dataset}"]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("{dataset}"));
    }

    #[test]
    fn rejects_unknown_guard_flag() {
        let err = parse(
            r#"
            [[dataset]]
            name = "osm_ger"
            path = "data/osm_ger/"

            [[matrix]]
            name = "bb"
            features = [[[], ["chpot-alt"]]]
            guards = [{ flag = "chpot-cch", excludes = ["chpot-alt"] }]
            [[matrix.command]]
            args = ["chpot_features", "{features}"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(msg) if msg.contains("chpot-cch")));
    }

    #[test]
    fn rejects_self_dependency_and_duplicates() {
        assert!(parse(
            r#"
            [[rule]]
            id = "a"
            deps = ["./a"]
            "#
        )
        .is_err());

        let err = parse(
            r#"
            [[rule]]
            id = "a"
            [[rule]]
            id = "a/"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateRule(id) if id == "a"));
    }
}
