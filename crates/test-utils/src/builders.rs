#![allow(dead_code)]

use pipedag::config::{
    CommandConfig, ConfigFile, DatasetConfig, MatrixConfig, ProgramConfig, RawConfigFile,
    RuleConfig, RuleKind,
};
use pipedag::matrix::{ConditionalEnv, GuardConfig};
use pipedag::types::{ModeFilter, TemporalClass, Visibility};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_default(mut self, target: &str) -> Self {
        self.config.config.default.push(target.to_string());
        self
    }

    pub fn with_exp_dir(mut self, dir: &str) -> Self {
        self.config.config.exp_dir = dir.to_string();
        self
    }

    pub fn with_dataset(mut self, dataset: DatasetConfig) -> Self {
        self.config.dataset.push(dataset);
        self
    }

    pub fn with_rule(mut self, rule: RuleConfig) -> Self {
        self.config.rule.push(rule);
        self
    }

    pub fn with_matrix(mut self, matrix: MatrixConfig) -> Self {
        self.config.matrix.push(matrix);
        self
    }

    /// Configure the contraction hierarchy builder program.
    pub fn with_ch_builder(mut self, program: &str) -> Self {
        self.config.derive.ch_builder = Some(program_config(&[program]));
        self
    }

    pub fn with_td_lower_bound(mut self, args: &[&str]) -> Self {
        self.config.derive.td_lower_bound = Some(program_config(args));
        self
    }

    pub fn with_cch_order(mut self, args: &[&str]) -> Self {
        self.config.derive.cch_order = Some(program_config(args));
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn program_config(args: &[&str]) -> ProgramConfig {
    ProgramConfig {
        args: strings(args),
        cwd: None,
        env: Default::default(),
        deps: Vec::new(),
    }
}

pub fn dataset(name: &str, path: &str) -> DatasetConfig {
    DatasetConfig {
        name: name.to_string(),
        path: path.to_string(),
        visibility: Visibility::Public,
        temporal: TemporalClass::Static,
        deps: Vec::new(),
    }
}

pub fn restricted_dataset(name: &str, path: &str) -> DatasetConfig {
    DatasetConfig {
        visibility: Visibility::Restricted,
        ..dataset(name, path)
    }
}

pub fn td_dataset(name: &str, path: &str) -> DatasetConfig {
    DatasetConfig {
        temporal: TemporalClass::TimeDependent,
        ..dataset(name, path)
    }
}

/// Builder for `RuleConfig`.
pub struct RuleBuilder {
    rule: RuleConfig,
}

impl RuleBuilder {
    pub fn file(id: &str) -> Self {
        Self::with_kind(id, RuleKind::File)
    }

    pub fn directory(id: &str) -> Self {
        Self::with_kind(id, RuleKind::Directory)
    }

    pub fn phony(id: &str) -> Self {
        Self::with_kind(id, RuleKind::Phony)
    }

    fn with_kind(id: &str, kind: RuleKind) -> Self {
        Self {
            rule: RuleConfig {
                id: id.to_string(),
                kind,
                group: None,
                deps: Vec::new(),
                restricted_deps: Vec::new(),
                globs: Vec::new(),
                symlink: None,
                desc: None,
                command: Vec::new(),
            },
        }
    }

    pub fn dep(mut self, dep: &str) -> Self {
        self.rule.deps.push(dep.to_string());
        self
    }

    pub fn restricted_dep(mut self, dep: &str) -> Self {
        self.rule.restricted_deps.push(dep.to_string());
        self
    }

    pub fn glob(mut self, pattern: &str) -> Self {
        self.rule.globs.push(pattern.to_string());
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.rule.group = Some(group.to_string());
        self
    }

    pub fn symlink(mut self, target: &str) -> Self {
        self.rule.symlink = Some(target.to_string());
        self
    }

    pub fn command(mut self, command: CommandConfig) -> Self {
        self.rule.command.push(command);
        self
    }

    /// Shorthand for a plain command.
    pub fn run(self, args: &[&str]) -> Self {
        self.command(CommandBuilder::new(args).build())
    }

    pub fn build(self) -> RuleConfig {
        self.rule
    }
}

/// Builder for `CommandConfig`.
pub struct CommandBuilder {
    command: CommandConfig,
}

impl CommandBuilder {
    pub fn new(args: &[&str]) -> Self {
        Self {
            command: CommandConfig {
                args: strings(args),
                ..CommandConfig::default()
            },
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn cwd(mut self, dir: &str) -> Self {
        self.command.cwd = Some(dir.to_string());
        self
    }

    pub fn stdout(mut self, path: &str) -> Self {
        self.command.stdout = Some(path.to_string());
        self
    }

    pub fn append(mut self) -> Self {
        self.command.append = true;
        self
    }

    pub fn header(mut self, header: &str) -> Self {
        self.command.header = Some(header.to_string());
        self
    }

    pub fn only_in(mut self, mode: ModeFilter) -> Self {
        self.command.only_in = Some(mode);
        self
    }

    pub fn restricted(mut self) -> Self {
        self.command.restricted = true;
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.command.category = Some(category.to_string());
        self
    }

    pub fn extension(mut self, extension: &str) -> Self {
        self.command.extension = Some(extension.to_string());
        self
    }

    pub fn datasets(mut self, names: &[&str]) -> Self {
        self.command.datasets = Some(strings(names));
        self
    }

    pub fn build(self) -> CommandConfig {
        self.command
    }
}

/// Builder for `MatrixConfig`.
pub struct MatrixBuilder {
    matrix: MatrixConfig,
}

impl MatrixBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            matrix: MatrixConfig {
                name: name.to_string(),
                group: "exp".to_string(),
                category: None,
                extension: "json".to_string(),
                datasets: None,
                temporal: None,
                requires: Vec::new(),
                restricted_requires: Vec::new(),
                cwd: None,
                env: Default::default(),
                env_when: Vec::new(),
                repeat: 1,
                features: Vec::new(),
                guards: Vec::new(),
                restricted_features: Vec::new(),
                restricted: false,
                desc: None,
                command: Vec::new(),
            },
        }
    }

    pub fn datasets(mut self, names: &[&str]) -> Self {
        self.matrix.datasets = Some(strings(names));
        self
    }

    pub fn requires(mut self, template: &str) -> Self {
        self.matrix.requires.push(template.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.matrix.category = Some(category.to_string());
        self
    }

    pub fn repeat(mut self, n: usize) -> Self {
        self.matrix.repeat = n;
        self
    }

    /// Add a feature axis; each entry is one subset of flags.
    pub fn feature_axis(mut self, subsets: &[&[&str]]) -> Self {
        self.matrix
            .features
            .push(subsets.iter().map(|s| strings(s)).collect());
        self
    }

    pub fn excludes(mut self, flag: &str, others: &[&str]) -> Self {
        self.matrix.guards.push(GuardConfig {
            flag: flag.to_string(),
            requires: Vec::new(),
            excludes: strings(others),
        });
        self
    }

    pub fn requires_flags(mut self, flag: &str, others: &[&str]) -> Self {
        self.matrix.guards.push(GuardConfig {
            flag: flag.to_string(),
            requires: strings(others),
            excludes: Vec::new(),
        });
        self
    }

    pub fn env_when(mut self, flags: &[&str], key: &str, value: &str) -> Self {
        self.matrix.env_when.push(ConditionalEnv {
            flags: strings(flags),
            env: [(key.to_string(), value.to_string())].into(),
        });
        self
    }

    pub fn restricted_feature(mut self, flag: &str) -> Self {
        self.matrix.restricted_features.push(flag.to_string());
        self
    }

    pub fn restricted(mut self) -> Self {
        self.matrix.restricted = true;
        self
    }

    pub fn command(mut self, command: CommandConfig) -> Self {
        self.matrix.command.push(command);
        self
    }

    pub fn run(self, args: &[&str]) -> Self {
        self.command(CommandBuilder::new(args).build())
    }

    pub fn build(self) -> MatrixConfig {
        self.matrix
    }
}
