// src/config/run.rs

//! Immutable per-run settings merged from CLI flags, environment and file.

use std::path::PathBuf;

use crate::cli::CliArgs;
use crate::config::model::ConfigSection;
use crate::errors::{PipelineError, Result};

/// Settings for one invocation, built once at startup.
///
/// Core logic receives this by parameter and never reads the process
/// environment itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Skip restricted datasets, commands and features.
    pub public_only: bool,
    /// Value of `{queries}`.
    pub query_count: u64,
    /// Concurrency limit for actions (1 = sequential).
    pub jobs: usize,
    pub dry_run: bool,
    /// Value of `{nproc}`.
    pub nproc: usize,
    /// Directory that relative paths in rendered commands are anchored to.
    pub root: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            public_only: false,
            query_count: 1000,
            jobs: 1,
            dry_run: false,
            nproc: 1,
            root: PathBuf::new(),
        }
    }
}

/// Environment switches, captured once at the process edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub only_public: Option<bool>,
    pub queries: Option<u64>,
    pub jobs: Option<usize>,
}

impl EnvOverrides {
    pub fn from_process() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Parse the recognised variables out of `vars`.
    ///
    /// - `PIPEDAG_ONLY_PUBLIC`: boolean (`1`, `true`, `yes`, `0`, `false`, `no`)
    /// - `ONLY_PUBLIC`: public-only whenever set, whatever its value
    /// - `NUM_DIJKSTRA_QUERIES`: query count
    /// - `PIPEDAG_JOBS`: concurrency limit
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut env = EnvOverrides::default();
        let mut legacy_public = false;

        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                "PIPEDAG_ONLY_PUBLIC" => env.only_public = Some(parse_bool(value)?),
                "ONLY_PUBLIC" => legacy_public = true,
                "NUM_DIJKSTRA_QUERIES" => {
                    env.queries = Some(parse_number("NUM_DIJKSTRA_QUERIES", value)?)
                }
                "PIPEDAG_JOBS" => env.jobs = Some(parse_number("PIPEDAG_JOBS", value)?),
                _ => {}
            }
        }

        if env.only_public.is_none() && legacy_public {
            env.only_public = Some(true);
        }
        Ok(env)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PipelineError::ConfigError(format!(
            "PIPEDAG_ONLY_PUBLIC must be a boolean (got '{other}')"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        PipelineError::ConfigError(format!("{name} must be a non-negative integer (got '{value}')"))
    })
}

impl RunConfig {
    /// Merge settings: CLI flag, then environment, then `[config]`, then default.
    pub fn resolve(
        cli: &CliArgs,
        section: &ConfigSection,
        env: &EnvOverrides,
        root: PathBuf,
    ) -> Result<Self> {
        let jobs = cli.jobs.or(env.jobs).or(section.jobs).unwrap_or(1);
        if jobs == 0 {
            return Err(PipelineError::ConfigError(
                "jobs must be >= 1 (got 0)".to_string(),
            ));
        }

        let nproc = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Ok(Self {
            public_only: cli.only_public || env.only_public.unwrap_or(false),
            query_count: cli
                .queries
                .or(env.queries)
                .unwrap_or(section.default_queries),
            jobs,
            dry_run: cli.dry_run,
            nproc,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_switches_are_parsed() {
        let env = EnvOverrides::from_vars([
            ("ONLY_PUBLIC", ""),
            ("NUM_DIJKSTRA_QUERIES", "250"),
            ("HOME", "/root"),
        ])
        .unwrap();
        assert_eq!(env.only_public, Some(true));
        assert_eq!(env.queries, Some(250));
        assert_eq!(env.jobs, None);

        let explicit = EnvOverrides::from_vars([("PIPEDAG_ONLY_PUBLIC", "0"), ("ONLY_PUBLIC", "1")])
            .unwrap();
        assert_eq!(explicit.only_public, Some(false));

        assert!(EnvOverrides::from_vars([("PIPEDAG_JOBS", "many")]).is_err());
    }

    #[test]
    fn cli_overrides_env_and_file() {
        let section = ConfigSection {
            jobs: Some(2),
            default_queries: 10,
            ..ConfigSection::default()
        };
        let env = EnvOverrides {
            only_public: None,
            queries: Some(20),
            jobs: Some(3),
        };
        let cli = CliArgs {
            queries: Some(30),
            ..CliArgs::default()
        };

        let run = RunConfig::resolve(&cli, &section, &env, PathBuf::new()).unwrap();
        assert_eq!(run.query_count, 30);
        assert_eq!(run.jobs, 3);
        assert!(!run.public_only);

        let zero = CliArgs {
            jobs: Some(0),
            ..CliArgs::default()
        };
        assert!(RunConfig::resolve(&zero, &section, &env, PathBuf::new()).is_err());
    }
}
