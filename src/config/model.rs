// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::matrix::axes::{ConditionalEnv, GuardConfig};
use crate::types::{ModeFilter, TemporalClass, Visibility};

/// Top-level pipeline file, as deserialized from TOML.
///
/// ```toml
/// [config]
/// default = ["paper/ch_potentials.pdf"]
///
/// [[dataset]]
/// name = "osm_ger"
/// path = "data/osm_ger/"
///
/// [[rule]]
/// id = "paper/table/graphs.tex"
/// globs = ["exp/preprocessing/*.json"]
/// [[rule.command]]
/// args = ["eval/graphs.py"]
///
/// [[matrix]]
/// name = "rphast"
/// requires = ["{dataset}/lower_bound_ch/order"]
/// [[matrix.command]]
/// args = ["cargo", "run", "--release", "--bin", "rphast", "--", "{dataset}"]
/// ```
///
/// Datasets, rules and matrices are arrays of tables so that declaration
/// order is preserved; it decides expansion order and scheduling ties.
/// Use [`ConfigFile`] (validated via `TryFrom`) everywhere else.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub dataset: Vec<DatasetConfig>,

    #[serde(default)]
    pub derive: DeriveSection,

    #[serde(default)]
    pub rule: Vec<RuleConfig>,

    #[serde(default)]
    pub matrix: Vec<MatrixConfig>,
}

/// Validated pipeline file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub dataset: Vec<DatasetConfig>,
    pub derive: DeriveSection,
    pub rule: Vec<RuleConfig>,
    pub matrix: Vec<MatrixConfig>,
}

impl ConfigFile {
    /// Skips validation; only `TryFrom<RawConfigFile>` should call this.
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            dataset: raw.dataset,
            derive: raw.derive,
            rule: raw.rule,
            matrix: raw.matrix,
        }
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetConfig> {
        self.dataset.iter().find(|d| d.name == name)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Targets (node ids or group names) built when none are requested.
    #[serde(default)]
    pub default: Vec<String>,

    /// Root of all experiment category directories.
    #[serde(default = "default_exp_dir")]
    pub exp_dir: String,

    /// Concurrency limit; `None` means sequential unless overridden.
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Value of `{queries}` unless `NUM_DIJKSTRA_QUERIES` or `--queries` is set.
    #[serde(default = "default_queries")]
    pub default_queries: u64,
}

fn default_exp_dir() -> String {
    "exp".to_string()
}

fn default_queries() -> u64 {
    1000
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default: Vec::new(),
            exp_dir: default_exp_dir(),
            jobs: None,
            default_queries: default_queries(),
        }
    }
}

/// `[[dataset]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub name: String,
    /// Dataset root directory, relative to the pipeline file.
    pub path: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub temporal: TemporalClass,
    /// Nodes that produce the dataset itself (e.g. an import rule).
    #[serde(default)]
    pub deps: Vec<String>,
}

/// `[derive]` section: external programs for dataset-derived artifacts.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeriveSection {
    /// Group the derived targets are registered under.
    #[serde(default = "default_derive_group")]
    pub group: String,

    /// Contraction hierarchy builder; inputs and outputs are appended.
    #[serde(default)]
    pub ch_builder: Option<ProgramConfig>,

    /// Computes `lower_bound` for time-dependent datasets.
    #[serde(default)]
    pub td_lower_bound: Option<ProgramConfig>,

    /// Computes the nested-dissection order `cch_perm`.
    #[serde(default)]
    pub cch_order: Option<ProgramConfig>,
}

fn default_derive_group() -> String {
    "prep".to_string()
}

impl Default for DeriveSection {
    fn default() -> Self {
        Self {
            group: default_derive_group(),
            ch_builder: None,
            td_lower_bound: None,
            cch_order: None,
        }
    }
}

/// An external program used by a derivation rule.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProgramConfig {
    /// Program followed by its arguments.
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Extra prerequisites, typically the program binary itself.
    #[serde(default)]
    pub deps: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    #[default]
    File,
    Directory,
    Phony,
}

/// `[[rule]]` entry: a static node.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub id: String,

    #[serde(default)]
    pub kind: RuleKind,

    #[serde(default)]
    pub group: Option<String>,

    #[serde(default)]
    pub deps: Vec<String>,

    /// Prerequisites only used when restricted data is available.
    #[serde(default)]
    pub restricted_deps: Vec<String>,

    /// Glob prerequisites, expanded when the rule is evaluated.
    #[serde(default)]
    pub globs: Vec<String>,

    /// Create the node as a symlink to this target instead of running commands.
    #[serde(default)]
    pub symlink: Option<String>,

    #[serde(default)]
    pub desc: Option<String>,

    #[serde(default)]
    pub command: Vec<CommandConfig>,
}

/// `[[rule.command]]` / `[[matrix.command]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    /// Program followed by its arguments.
    pub args: Vec<String>,

    #[serde(default)]
    pub cwd: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Redirect stdout to this path. Matrix commands default to `{output}`.
    #[serde(default)]
    pub stdout: Option<String>,

    #[serde(default)]
    pub append: bool,

    /// Line written to the redirect target before the program runs.
    #[serde(default)]
    pub header: Option<String>,

    #[serde(default)]
    pub only_in: Option<ModeFilter>,

    /// Dropped in public-only mode.
    #[serde(default)]
    pub restricted: bool,

    // Matrix-only overrides.
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub extension: Option<String>,

    /// Only expand this command for the named datasets.
    #[serde(default)]
    pub datasets: Option<Vec<String>>,

    /// Only expand this command for datasets of this temporal class.
    #[serde(default)]
    pub temporal: Option<TemporalClass>,
}

impl CommandConfig {
    /// Whether the command takes part in a run with the given mode.
    pub fn enabled(&self, public_only: bool) -> bool {
        if self.restricted && public_only {
            return false;
        }
        self.only_in.map_or(true, |mode| mode.admits(public_only))
    }

    pub(crate) fn has_matrix_overrides(&self) -> bool {
        self.category.is_some()
            || self.extension.is_some()
            || self.datasets.is_some()
            || self.temporal.is_some()
    }
}

/// `[[matrix]]` entry: a parameterized experiment.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    pub name: String,

    #[serde(default = "default_matrix_group")]
    pub group: String,

    /// Output category directory under `exp_dir`; defaults to `name`.
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default = "default_extension")]
    pub extension: String,

    /// Dataset names; all datasets when omitted.
    #[serde(default)]
    pub datasets: Option<Vec<String>>,

    #[serde(default)]
    pub temporal: Option<TemporalClass>,

    /// Prerequisite templates rendered per dataset.
    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub restricted_requires: Vec<String>,

    #[serde(default)]
    pub cwd: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub env_when: Vec<ConditionalEnv>,

    #[serde(default = "default_repeat")]
    pub repeat: usize,

    /// Feature axes: each axis lists the flag subsets to choose from.
    #[serde(default)]
    pub features: Vec<Vec<Vec<String>>>,

    #[serde(default)]
    pub guards: Vec<GuardConfig>,

    /// Variants using any of these flags are dropped in public-only mode.
    #[serde(default)]
    pub restricted_features: Vec<String>,

    /// The whole matrix is dropped in public-only mode.
    #[serde(default)]
    pub restricted: bool,

    #[serde(default)]
    pub desc: Option<String>,

    #[serde(default)]
    pub command: Vec<CommandConfig>,
}

fn default_matrix_group() -> String {
    "exp".to_string()
}

fn default_extension() -> String {
    "json".to_string()
}

fn default_repeat() -> usize {
    1
}

impl MatrixConfig {
    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or(&self.name)
    }

    /// Id of the phony node aggregating all variants.
    pub fn aggregate_id(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }
}
