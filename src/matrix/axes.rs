// src/matrix/axes.rs

//! Feature axes, guards and conditional environment for experiment matrices.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Ordered, deduplicated set of feature flags.
///
/// Order is the order in which flags were chosen along the feature axes, so
/// the rendered `--features` argument is reproducible across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FeatureSet(Vec<String>);

impl FeatureSet {
    /// Concatenate subsets, dropping repeated flags.
    pub fn from_subsets<I, S>(subsets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[String]>,
    {
        let mut flags: Vec<String> = Vec::new();
        for subset in subsets {
            for flag in subset.as_ref() {
                if !flags.contains(flag) {
                    flags.push(flag.clone());
                }
            }
        }
        FeatureSet(flags)
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.iter().any(|f| f == flag)
    }

    pub fn contains_all(&self, flags: &[String]) -> bool {
        flags.iter().all(|f| self.contains(f))
    }

    pub fn contains_any(&self, flags: &[String]) -> bool {
        flags.iter().any(|f| self.contains(f))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Space-separated flags, as cargo expects them.
    pub fn joined(&self) -> String {
        self.0.join(" ")
    }
}

/// Guard as written in the pipeline file.
///
/// ```toml
/// guards = [{ flag = "chpot-improved-pruning", excludes = ["chpot-oracle"] }]
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    pub flag: String,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// Per-combination compatibility predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// If `flag` is set, every flag in `others` must be set too.
    Requires { flag: String, others: Vec<String> },
    /// If `flag` is set, none of `others` may be set.
    Excludes { flag: String, others: Vec<String> },
}

impl Guard {
    pub fn admits(&self, features: &FeatureSet) -> bool {
        match self {
            Guard::Requires { flag, others } => {
                !features.contains(flag) || features.contains_all(others)
            }
            Guard::Excludes { flag, others } => {
                !features.contains(flag) || !features.contains_any(others)
            }
        }
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        let (flag, others) = match self {
            Guard::Requires { flag, others } | Guard::Excludes { flag, others } => (flag, others),
        };
        std::iter::once(flag.as_str()).chain(others.iter().map(String::as_str))
    }
}

impl GuardConfig {
    pub fn to_guards(&self) -> Vec<Guard> {
        let mut guards = Vec::new();
        if !self.requires.is_empty() {
            guards.push(Guard::Requires {
                flag: self.flag.clone(),
                others: self.requires.clone(),
            });
        }
        if !self.excludes.is_empty() {
            guards.push(Guard::Excludes {
                flag: self.flag.clone(),
                others: self.excludes.clone(),
            });
        }
        guards
    }
}

/// Extra environment for variants whose feature set contains all `flags`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConditionalEnv {
    pub flags: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ConditionalEnv {
    pub fn applies_to(&self, features: &FeatureSet) -> bool {
        features.contains_all(&self.flags)
    }
}

/// Cartesian product over feature axes, axis 0 outermost.
///
/// Each axis is a list of flag subsets; no axes yields a single empty set.
pub fn feature_combinations(axes: &[Vec<Vec<String>>]) -> Vec<FeatureSet> {
    let mut combos: Vec<Vec<&[String]>> = vec![Vec::new()];
    for axis in axes {
        let mut next = Vec::with_capacity(combos.len() * axis.len());
        for prefix in &combos {
            for subset in axis {
                let mut combo = prefix.clone();
                combo.push(subset.as_slice());
                next.push(combo);
            }
        }
        combos = next;
    }
    combos.into_iter().map(FeatureSet::from_subsets).collect()
}
