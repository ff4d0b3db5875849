#![allow(dead_code)]

use std::sync::Arc;

use pipedag::config::{ConfigFile, RunConfig};
use pipedag::dataset::GRAPH_FILES;
use pipedag::engine::{RunReport, Runtime};
use pipedag::errors::Result;
use pipedag::fs::mock::MockFileSystem;
use pipedag::matrix::OutputNamer;
use pipedag::pipeline::Pipeline;
use pipedag_test_utils::fake_executor::FakeExecutor;

pub const STAMP: &str = "2020-01-01T12:00:00.000+01:00";

/// Put an imported graph (all layout files) into the mock filesystem.
pub fn add_graph(fs: &MockFileSystem, root: &str) {
    for file in GRAPH_FILES {
        fs.add_file(format!("{root}/{file}"), file);
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Assemble the pipeline and run `targets` against the mock filesystem.
pub async fn run_targets(
    cfg: &ConfigFile,
    run: &RunConfig,
    fs: &MockFileSystem,
    executor: &Arc<FakeExecutor>,
    targets: &[&str],
) -> Result<RunReport> {
    let mut namer = OutputNamer::with_stamp(STAMP);
    let pipeline = Pipeline::build(cfg, run, &mut namer)?;
    let targets = pipeline.resolve_targets(&strings(targets), &[])?;

    let runtime = Runtime::new(
        pipeline.registry,
        Arc::new(fs.clone()),
        Arc::clone(executor),
        run.clone(),
    );
    runtime.run(&targets).await
}

/// Names of the files directly inside `dir`, sorted.
pub fn listing(fs: &MockFileSystem, dir: &str) -> Vec<String> {
    use pipedag::fs::FileSystem;
    let mut names: Vec<String> = fs
        .read_dir(std::path::Path::new(dir))
        .unwrap_or_default()
        .into_iter()
        .filter(|p| fs.is_file(p))
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names
}
