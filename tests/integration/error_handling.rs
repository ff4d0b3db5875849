use std::io::Write;

use pipedag::config::{load_and_validate, load_from_path, RunConfig};
use pipedag::errors::PipelineError;
use pipedag::matrix::OutputNamer;
use pipedag::pipeline::Pipeline;
use tempfile::NamedTempFile;

fn pipeline_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = pipeline_file("[[rule]\nid = ");
    let err = load_from_path(file.path()).unwrap_err();
    assert!(matches!(err, PipelineError::TomlError(_)), "got {err:?}");
}

#[test]
fn unknown_keys_are_rejected() {
    let file = pipeline_file(
        r#"
        [[rule]]
        id = "out.txt"
        dependencies = ["in.txt"]
        "#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, PipelineError::TomlError(_)), "got {err:?}");
}

#[test]
fn missing_pipeline_file_carries_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Pipeline.toml");
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, PipelineError::Other(_)));
    assert!(format!("{err:#}").contains("Pipeline.toml"));
}

#[test]
fn matrix_with_unknown_dataset_is_a_config_error() {
    let file = pipeline_file(
        r#"
        [[dataset]]
        name = "osm_ger"
        path = "data/osm_ger/"

        [[matrix]]
        name = "rphast"
        datasets = ["osm_eur"]
        [[matrix.command]]
        args = ["rphast", "{dataset}"]
        "#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    match err {
        PipelineError::ConfigError(msg) => assert!(msg.contains("osm_eur"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn time_dependent_dataset_without_program_is_a_config_error() {
    let file = pipeline_file(
        r#"
        [[dataset]]
        name = "ptv20"
        path = "data/ptv20/"
        temporal = "time_dependent"
        "#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(_)));
}

#[test]
fn cycle_through_dataset_rules_is_found_at_assembly() {
    // The import depends on the CH of its own dataset.
    let file = pipeline_file(
        r#"
        [[dataset]]
        name = "osm_ger"
        path = "data/osm_ger/"
        deps = ["data/osm_ger/first_out"]

        [derive.ch_builder]
        args = ["compute_ch"]

        [[rule]]
        id = "data/osm_ger/first_out"
        deps = ["data/osm_ger/lower_bound_ch/order"]
        [[rule.command]]
        args = ["import_osm"]
        "#,
    );
    let cfg = load_and_validate(file.path()).unwrap();
    let err = Pipeline::build(&cfg, &RunConfig::default(), &mut OutputNamer::with_stamp("t"))
        .unwrap_err();
    assert!(matches!(err, PipelineError::CycleDetected(_)), "got {err:?}");
}

#[test]
fn errors_map_to_exit_statuses() {
    let failed = PipelineError::ActionFailed {
        node: "out".into(),
        status: 7,
    };
    assert_eq!(failed.exit_status(), 7);

    let signalled = PipelineError::ActionFailed {
        node: "out".into(),
        status: -1,
    };
    assert_eq!(signalled.exit_status(), 1);

    assert_eq!(PipelineError::UnknownTarget("x".into()).exit_status(), 1);
}
