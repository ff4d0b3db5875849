// src/matrix/mod.rs

//! Parameterized experiment matrices.
//!
//! - [`axes`] holds feature sets, guards and conditional environment.
//! - [`template`] renders `{placeholder}` arguments.
//! - [`naming`] generates collision-free output paths.
//! - [`expander`] turns a matrix declaration into concrete variants.

pub mod axes;
pub mod expander;
pub mod naming;
pub mod template;

pub use axes::{ConditionalEnv, FeatureSet, Guard, GuardConfig};
pub use expander::{expand, ExperimentVariant};
pub use naming::OutputNamer;
