use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use proptest::sample::Index;

use pipedag::config::RunConfig;
use pipedag::dag::{Action, ArtifactNode, Registry};
use pipedag::engine::{RunReport, Runtime};
use pipedag::exec::CommandSpec;
use pipedag::fs::mock::MockFileSystem;
use pipedag_test_utils::fake_executor::FakeExecutor;

/// A random DAG: node `i` depends on its own source file and on some
/// nodes with a smaller index.
#[derive(Debug, Clone)]
struct Dag {
    deps: Vec<BTreeSet<usize>>,
}

impl Dag {
    fn id(i: usize) -> String {
        format!("out/n{i}")
    }

    fn source(i: usize) -> String {
        format!("src/n{i}")
    }

    fn registry(&self) -> Registry {
        let mut registry = Registry::new();
        for (i, deps) in self.deps.iter().enumerate() {
            let command = CommandSpec::new("build").arg(Self::id(i));
            let mut node = ArtifactNode::file(&Self::id(i), Action::Run(vec![command]))
                .depends_on(&Self::source(i));
            for &d in deps {
                node = node.depends_on(&Self::id(d));
            }
            registry.register(node).unwrap();
        }
        registry
    }

    /// `k` and every node reaching `k` through dependencies.
    fn dependents_of(&self, k: usize) -> BTreeSet<usize> {
        let mut affected = BTreeSet::from([k]);
        for i in k + 1..self.deps.len() {
            if self.deps[i].iter().any(|d| affected.contains(d)) {
                affected.insert(i);
            }
        }
        affected
    }
}

fn dag_strategy() -> impl Strategy<Value = Dag> {
    prop::collection::vec(prop::collection::vec(any::<Index>(), 0..3), 1..10).prop_map(|raw| {
        let deps = raw
            .iter()
            .enumerate()
            .map(|(i, picks)| {
                if i == 0 {
                    BTreeSet::new()
                } else {
                    picks.iter().map(|p| p.index(i)).collect()
                }
            })
            .collect();
        Dag { deps }
    })
}

fn run_all(dag: &Dag, fs: &MockFileSystem, executor: &Arc<FakeExecutor>, jobs: usize) -> RunReport {
    let targets: Vec<String> = (0..dag.deps.len()).map(Dag::id).collect();
    let runtime = Runtime::new(
        dag.registry(),
        Arc::new(fs.clone()),
        Arc::clone(executor),
        RunConfig {
            jobs,
            ..RunConfig::default()
        },
    );
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(runtime.run(&targets))
        .unwrap()
}

fn index_of(id: &str) -> usize {
    id.trim_start_matches("out/n").parse().unwrap()
}

proptest! {
    #[test]
    fn second_run_does_nothing(dag in dag_strategy(), jobs in 1usize..4) {
        let fs = MockFileSystem::new();
        for i in 0..dag.deps.len() {
            fs.add_file(Dag::source(i), "src");
        }
        let executor = Arc::new(FakeExecutor::new(fs.clone()));

        let first = run_all(&dag, &fs, &executor, jobs);
        prop_assert_eq!(first.executed.len(), dag.deps.len());

        let second = run_all(&dag, &fs, &executor, jobs);
        prop_assert!(second.executed.is_empty());
        prop_assert_eq!(executor.invocation_count(), dag.deps.len());
    }

    #[test]
    fn touched_source_rebuilds_exactly_its_dependents(
        dag in dag_strategy(),
        pick in any::<Index>(),
        jobs in 1usize..4,
    ) {
        let fs = MockFileSystem::new();
        for i in 0..dag.deps.len() {
            fs.add_file(Dag::source(i), "src");
        }
        let executor = Arc::new(FakeExecutor::new(fs.clone()));
        run_all(&dag, &fs, &executor, jobs);

        let k = pick.index(dag.deps.len());
        fs.touch(Dag::source(k));
        let report = run_all(&dag, &fs, &executor, jobs);

        let rebuilt: BTreeSet<usize> = report.executed.iter().map(|id| index_of(id)).collect();
        prop_assert_eq!(&rebuilt, &dag.dependents_of(k));

        // Every rebuilt node comes after the rebuilt nodes it depends on.
        for (pos, id) in report.executed.iter().enumerate() {
            let i = index_of(id);
            for d in &dag.deps[i] {
                if let Some(dep_pos) = report.executed.iter().position(|e| index_of(e) == *d) {
                    prop_assert!(dep_pos < pos, "{} ran before its dependency {}", id, d);
                }
            }
        }
    }
}
