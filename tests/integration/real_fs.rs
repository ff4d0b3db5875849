use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use pipedag::config::{ConfigFile, RunConfig};
use pipedag::dag::glob;
use pipedag::dataset::GRAPH_FILES;
use pipedag::engine::{RunReport, Runtime};
use pipedag::errors::{PipelineError, Result};
use pipedag::exec::ProcessExecutor;
use pipedag::fs::RealFileSystem;
use pipedag::matrix::OutputNamer;
use pipedag::pipeline::Pipeline;
use pipedag_test_utils::builders::{
    dataset, CommandBuilder, ConfigFileBuilder, MatrixBuilder, RuleBuilder,
};
use pipedag_test_utils::init_tracing;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        init_tracing();
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, rel: &str) -> String {
        self.dir.path().join(rel).to_string_lossy().into_owned()
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn run_config(&self) -> RunConfig {
        RunConfig {
            root: self.dir.path().to_path_buf(),
            ..RunConfig::default()
        }
    }

    async fn run(&self, cfg: &ConfigFile, stamp: &str, targets: &[String]) -> Result<RunReport> {
        let run = self.run_config();
        let pipeline = Pipeline::build(cfg, &run, &mut OutputNamer::with_stamp(stamp))?;
        let targets = pipeline.resolve_targets(targets, &[])?;
        Runtime::new(
            pipeline.registry,
            Arc::new(RealFileSystem),
            Arc::new(ProcessExecutor::new()),
            run,
        )
        .run(&targets)
        .await
    }
}

fn push_mtime_forward(path: &str) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
}

#[tokio::test]
async fn redirected_rule_output_is_reused_until_input_changes() {
    let ws = Workspace::new();
    ws.write("in.txt", "input");
    let out = ws.path("out.txt");
    let cfg = ConfigFileBuilder::new()
        .with_rule(
            RuleBuilder::file(&out)
                .dep(&ws.path("in.txt"))
                .command(
                    CommandBuilder::new(&["sh", "-c", "echo built"])
                        .stdout(&out)
                        .header("# log")
                        .build(),
                )
                .build(),
        )
        .build();
    let targets = vec![out.clone()];

    let report = ws.run(&cfg, "s1", &targets).await.unwrap();
    assert_eq!(report.executed, vec![out.clone()]);
    assert_eq!(fs::read_to_string(&out).unwrap(), "# log\nbuilt\n");

    let report = ws.run(&cfg, "s2", &targets).await.unwrap();
    assert!(report.executed.is_empty());
    assert_eq!(report.skipped, vec![out.clone()]);

    push_mtime_forward(&ws.path("in.txt"));
    let report = ws.run(&cfg, "s3", &targets).await.unwrap();
    assert_eq!(report.executed, vec![out]);
}

#[tokio::test]
async fn non_zero_exit_becomes_action_failed() {
    let ws = Workspace::new();
    let out = ws.path("never.txt");
    let cfg = ConfigFileBuilder::new()
        .with_rule(RuleBuilder::file(&out).run(&["sh", "-c", "exit 7"]).build())
        .build();

    let err = ws.run(&cfg, "s1", &[out.clone()]).await.unwrap_err();
    match &err {
        PipelineError::ActionFailed { node, status } => {
            assert_eq!(node, &out);
            assert_eq!(*status, 7);
        }
        other => panic!("expected ActionFailed, got {other:?}"),
    }
    assert_eq!(err.exit_status(), 7);
    assert!(!Path::new(&out).exists());
}

#[tokio::test]
async fn failed_redirected_rule_is_rebuilt_next_run() {
    let ws = Workspace::new();
    let out = ws.path("out.csv");
    let cfg = ConfigFileBuilder::new()
        .with_rule(
            RuleBuilder::file(&out)
                .command(
                    CommandBuilder::new(&["sh", "-c", "echo partial; exit 3"])
                        .stdout(&out)
                        .build(),
                )
                .build(),
        )
        .build();
    let targets = vec![out.clone()];

    let err = ws.run(&cfg, "s1", &targets).await.unwrap_err();
    assert!(matches!(err, PipelineError::ActionFailed { status: 3, .. }), "got {err:?}");
    assert!(!Path::new(&out).exists());

    let err = ws.run(&cfg, "s2", &targets).await.unwrap_err();
    assert!(matches!(err, PipelineError::ActionFailed { status: 3, .. }), "got {err:?}");
}

#[test]
fn glob_walk_skips_symlinked_directories() {
    let ws = Workspace::new();
    ws.write("exp/a/x.json", "{}");
    std::os::unix::fs::symlink("..", ws.path("exp/a/back")).unwrap();
    std::os::unix::fs::symlink("../..", ws.path("exp/a/up")).unwrap();

    let pattern = format!("{}/**/*.json", ws.path("exp"));
    let found = glob::expand(&RealFileSystem, &pattern).unwrap();

    assert_eq!(found, vec![PathBuf::from(ws.path("exp/a/x.json"))]);
}

#[tokio::test]
async fn lower_bound_symlink_and_ch_on_disk() {
    let ws = Workspace::new();
    for file in GRAPH_FILES {
        ws.write(&format!("data/osm_ger/{file}"), file);
    }
    let data = ws.path("data/osm_ger/");
    let mut cfg = ConfigFileBuilder::new().with_dataset(dataset("osm_ger", &data)).raw();
    // Touch the fourth argument: the `order` output.
    cfg.derive.ch_builder = Some(pipedag_test_utils::builders::program_config(&[
        "sh",
        "-c",
        "touch \"$4\"",
        "sh",
    ]));
    let cfg = ConfigFile::try_from(cfg).unwrap();
    let targets = vec!["prep:lower_bound_ch:osm_ger".to_string()];

    ws.run(&cfg, "s1", &targets).await.unwrap();

    let lower_bound = ws.path("data/osm_ger/lower_bound");
    let link = fs::read_link(&lower_bound).unwrap();
    assert_eq!(link, Path::new("travel_time"));
    assert_eq!(fs::read_to_string(&lower_bound).unwrap(), "travel_time");
    assert!(Path::new(&ws.path("data/osm_ger/lower_bound_ch/order")).is_file());

    let report = ws.run(&cfg, "s2", &targets).await.unwrap();
    assert_eq!(report.executed, vec!["prep:lower_bound_ch:osm_ger"]);
}

#[tokio::test]
async fn matrix_outputs_land_in_category_directory() {
    let ws = Workspace::new();
    ws.write("data/g/first_out", "");
    let exp = ws.path("exp");
    let cfg = ConfigFileBuilder::new()
        .with_exp_dir(&exp)
        .with_dataset(dataset("g", &ws.path("data/g/")))
        .with_matrix(
            MatrixBuilder::new("echo")
                .feature_axis(&[&[], &["fast"]])
                .run(&["sh", "-c", "echo \"$0\" \"$1\"", "{dataset}", "{features}"])
                .build(),
        )
        .build();

    ws.run(&cfg, "2020-01-01T12:00:00.000+01:00", &["exp:echo".to_string()])
        .await
        .unwrap();

    let mut outputs: Vec<_> = fs::read_dir(ws.path("exp/echo"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    outputs.sort();
    assert_eq!(outputs.len(), 2);
    let dataset_dir = ws.path("data/g/");
    assert_eq!(
        fs::read_to_string(&outputs[0]).unwrap(),
        format!("{dataset_dir} \n")
    );
    assert_eq!(
        fs::read_to_string(&outputs[1]).unwrap(),
        format!("{dataset_dir} --features\n")
    );
}
