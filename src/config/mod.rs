// src/config/mod.rs

//! Configuration loading and validation for pipedag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a pipeline file from disk (`loader.rs`).
//! - Validate references and templates (`validate.rs`).
//! - Merge CLI flags and environment into a `RunConfig` (`run.rs`).

pub mod loader;
pub mod model;
pub mod run;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path};
pub use model::{
    CommandConfig, ConfigFile, ConfigSection, DatasetConfig, DeriveSection, MatrixConfig,
    ProgramConfig, RawConfigFile, RuleConfig, RuleKind,
};
pub use run::{EnvOverrides, RunConfig};
