// src/matrix/template.rs

//! `{placeholder}` substitution for command arguments and prerequisites.

use std::collections::BTreeMap;

use crate::matrix::axes::FeatureSet;

pub const DATASET: &str = "dataset";
pub const QUERIES: &str = "queries";
pub const NPROC: &str = "nproc";
pub const OUTPUT: &str = "output";
pub const FEATURES: &str = "features";
pub const ROOT: &str = "root";

pub const ALL: &[&str] = &[DATASET, QUERIES, NPROC, OUTPUT, FEATURES, ROOT];

/// Values available to a template.
///
/// Unset values leave their placeholder untouched; configuration validation
/// rejects placeholders that are not available in a given context.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext<'a> {
    pub dataset: Option<&'a str>,
    pub features: Option<&'a FeatureSet>,
    pub output: Option<&'a str>,
    pub queries: u64,
    pub nproc: usize,
    pub root: &'a str,
}

impl TemplateContext<'_> {
    fn value(&self, name: &str) -> Option<String> {
        match name {
            DATASET => self.dataset.map(str::to_string),
            OUTPUT => self.output.map(str::to_string),
            QUERIES => Some(self.queries.to_string()),
            NPROC => Some(self.nproc.to_string()),
            ROOT => Some(self.root.to_string()),
            FEATURES => self.features.map(|f| f.joined()),
            _ => None,
        }
    }
}

/// Names of all `{...}` placeholders in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                found.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    found
}

/// Substitute every known placeholder in a single string.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    let mut out = template.to_string();
    for name in ALL {
        let pattern = format!("{{{name}}}");
        if out.contains(&pattern) {
            if let Some(value) = ctx.value(name) {
                out = out.replace(&pattern, &value);
            }
        }
    }
    out
}

/// Render an argument list.
///
/// A whole-argument `{features}` expands to `--features "<f1 f2 ...>"` (two
/// argv entries) or disappears entirely for an empty feature set.
pub fn render_args(args: &[String], ctx: &TemplateContext<'_>) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        if arg == "{features}" {
            if let Some(features) = ctx.features {
                if !features.is_empty() {
                    out.push("--features".to_string());
                    out.push(features.joined());
                }
                continue;
            }
        }
        out.push(render(arg, ctx));
    }
    out
}

pub fn render_env(
    env: &BTreeMap<String, String>,
    ctx: &TemplateContext<'_>,
) -> BTreeMap<String, String> {
    env.iter()
        .map(|(k, v)| (k.clone(), render(v, ctx)))
        .collect()
}
