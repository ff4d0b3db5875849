// src/matrix/naming.rs

//! Collision-free output paths for experiment variants.

use std::path::{Path, PathBuf};

use chrono::Local;

/// Run-scoped output namer.
///
/// Every name combines the run's start time (millisecond precision) with a
/// per-run sequence number, so no two variants of one run share a path even
/// when they are generated within the same instant.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    stamp: String,
    seq: u64,
}

impl OutputNamer {
    /// Namer stamped with the current local time.
    pub fn now() -> Self {
        let stamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string();
        Self::with_stamp(stamp)
    }

    pub fn with_stamp(stamp: impl Into<String>) -> Self {
        Self {
            stamp: stamp.into(),
            seq: 0,
        }
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Next file name under `<exp_dir>/<category>/`.
    pub fn next_path(&mut self, exp_dir: &Path, category: &str, extension: &str) -> PathBuf {
        self.seq += 1;
        let file = format!("{}-{:04}.{}", self.stamp, self.seq, extension);
        exp_dir.join(category).join(file)
    }
}
