use std::path::PathBuf;

use pipedag::config::{load_and_validate, ConfigFile, RunConfig};
use pipedag::dag::Scheduler;
use pipedag::matrix::OutputNamer;
use pipedag::pipeline::Pipeline;

fn demo() -> ConfigFile {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/Pipeline.toml");
    load_and_validate(path).unwrap()
}

fn build(public_only: bool) -> Pipeline {
    let run = RunConfig {
        public_only,
        ..RunConfig::default()
    };
    let mut namer = OutputNamer::with_stamp("2020-01-01T12:00:00.000+01:00");
    Pipeline::build(&demo(), &run, &mut namer).unwrap()
}

fn count(pipeline: &Pipeline, matrix: &str) -> usize {
    pipeline.variants.iter().filter(|v| v.matrix == matrix).count()
}

#[test]
fn full_mode_expands_every_dataset() {
    let pipeline = build(false);

    assert_eq!(count(&pipeline, "preprocessing"), 6 * 10 * 3);
    assert_eq!(count(&pipeline, "scaled_weights"), 2);
    assert_eq!(count(&pipeline, "building_blocks"), 25);
    assert_eq!(count(&pipeline, "rphast"), 4);
    assert_eq!(count(&pipeline, "bidir_features"), 10);
    assert_eq!(count(&pipeline, "applications"), 16);
    assert_eq!(count(&pipeline, "alternatives"), 4);

    let targets = pipeline.resolve_targets(&[], &[]).unwrap();
    assert_eq!(targets, vec!["paper/ch_potentials.pdf"]);
    let plan = Scheduler::new(&pipeline.registry)
        .plan(&["exp:all".to_string()])
        .unwrap();
    let pos = |id: &str| plan.order.iter().position(|n| n == id).unwrap();
    assert!(pos("data/osm_ger/first_out") < pos("data/osm_ger/lower_bound"));
    assert!(pos("code/compute_ch/build/compute_ch") < pos("data/osm_ger/lower_bound_ch/order"));
    assert!(pos("data/osm_ger_td/ipp_travel_time") < pos("data/osm_ger_td/lower_bound"));
}

#[test]
fn public_mode_keeps_only_public_data() {
    let pipeline = build(true);

    assert_eq!(count(&pipeline, "preprocessing"), 30);
    assert_eq!(count(&pipeline, "applications"), 5);
    assert!(pipeline.variants.iter().all(|v| v.dataset == "osm_ger"));
    assert!(pipeline.registry.get("data/europe/lower_bound").is_none());
    assert!(pipeline.registry.get("exp:applications").is_some());
}

#[test]
fn preprocessing_logs_start_with_the_dataset_path() {
    let pipeline = build(true);
    let ch_log = pipeline
        .variants
        .iter()
        .find(|v| v.category == "preprocessing/ch")
        .unwrap();
    let redirect = ch_log.command.stdout.as_ref().unwrap();
    assert!(redirect.append);
    assert_eq!(redirect.header.as_deref(), Some("data/osm_ger/"));
    assert!(ch_log.output_path.ends_with(".out"));
}

#[test]
fn only_topo_variants_get_their_query_count() {
    let pipeline = build(false);
    let bidir: Vec<_> = pipeline
        .variants
        .iter()
        .filter(|v| v.matrix == "bidir_features")
        .collect();

    for variant in bidir {
        let queries = variant.command.env.get("CHPOT_NUM_QUERIES");
        if variant.features.contains("chpot-only-topo") {
            assert_eq!(queries.map(String::as_str), Some("1000"));
        } else {
            assert!(queries.is_none());
        }
    }
}

#[test]
fn listing_shows_groups_and_default() {
    let listing = build(false).listing();
    for group in ["prep:", "exp:", "fig:", "table:", "build:"] {
        assert!(listing.contains(&format!("\n{group}\n")) || listing.starts_with(&format!("{group}\n")), "{group}");
    }
    assert!(listing.contains("default: paper/ch_potentials.pdf"));
}
