// src/engine/runtime.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::run::RunConfig;
use crate::dag::node::{Action, ArtifactNode, NodeId, NodeKind};
use crate::dag::{NodeState, Plan, Registry, Scheduler, StalenessOracle};
use crate::engine::{ActionOutcome, RunReport};
use crate::errors::{PipelineError, Result};
use crate::exec::{ExecutorBackend, LeafInvocation};
use crate::fs::FileSystem;

/// Drives one pipeline run.
///
/// Responsibilities:
/// - Plan the requested targets (unknown targets and cycles fail here).
/// - Ask the staleness oracle about each node in dependency order.
/// - Run actions of dirty nodes: directories and symlinks directly through
///   the [`FileSystem`], commands through the [`ExecutorBackend`].
/// - Abort on the first failure without starting anything new, removing
///   any file the failed action left behind.
pub struct Runtime<E: ExecutorBackend + 'static> {
    registry: Registry,
    fs: Arc<dyn FileSystem>,
    executor: Arc<E>,
    config: RunConfig,
}

impl<E: ExecutorBackend + 'static> Runtime<E> {
    pub fn new(registry: Registry, fs: Arc<dyn FileSystem>, executor: Arc<E>, config: RunConfig) -> Self {
        Self {
            registry,
            fs,
            executor,
            config,
        }
    }

    /// Bring `targets` up to date.
    pub async fn run(&self, targets: &[NodeId]) -> Result<RunReport> {
        let plan = Scheduler::new(&self.registry).plan(targets)?;
        info!(targets = ?targets, nodes = plan.len(), "pipedag run started");

        if self.config.dry_run {
            return self.dry_run(&plan);
        }
        let mut plan = plan;
        if self.config.jobs <= 1 {
            self.run_sequential(&mut plan).await
        } else {
            self.run_parallel(&mut plan, self.config.jobs).await
        }
    }

    async fn run_sequential(&self, plan: &mut Plan) -> Result<RunReport> {
        let mut oracle = StalenessOracle::new(&self.registry, &*self.fs);
        let mut report = RunReport::default();

        for id in plan.order.clone() {
            let node = self.registry.resolve(&id)?;

            let dirty = match oracle.is_dirty(&id) {
                Ok(dirty) => dirty,
                Err(err) => return Err(abort(&report, err)),
            };
            if !dirty {
                plan.states.transition(&id, NodeState::Skipped)?;
                debug!(node = %id, "up to date");
                report.skipped.push(id);
                continue;
            }

            plan.states.transition(&id, NodeState::Executing)?;
            let result = match &node.action {
                Action::Run(_) => {
                    let before = self.output_mtime(node)?;
                    let result = run_external(&*self.executor, node).await;
                    if result.is_err() {
                        self.discard_partial(node, before);
                    }
                    result
                }
                _ => self.run_internal(node),
            };

            match result {
                Ok(()) => {
                    plan.states.transition(&id, NodeState::Succeeded)?;
                    report.executed.push(id);
                }
                Err(err) => {
                    plan.states.transition(&id, NodeState::Failed)?;
                    return Err(abort(&report, err));
                }
            }
        }

        info!(
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            "pipedag run finished"
        );
        Ok(report)
    }

    /// Run independent ready nodes concurrently, at most `jobs` commands at a
    /// time.
    ///
    /// Internal actions run on this task between completions, so concurrent
    /// `create_dir_all` calls for the same directory cannot happen.
    async fn run_parallel(&self, plan: &mut Plan, jobs: usize) -> Result<RunReport> {
        let mut oracle = StalenessOracle::new(&self.registry, &*self.fs);
        let mut report = RunReport::default();
        let mut pending: Vec<NodeId> = plan.order.clone();
        let mut in_flight: JoinSet<(NodeId, Result<()>)> = JoinSet::new();
        let mut started: HashMap<NodeId, Option<SystemTime>> = HashMap::new();
        let mut failure: Option<PipelineError> = None;

        loop {
            let mut idx = 0;
            while failure.is_none() && idx < pending.len() && in_flight.len() < jobs {
                if !plan.ready(&pending[idx]) {
                    idx += 1;
                    continue;
                }

                let id = pending.remove(idx);
                let node = self.registry.resolve(&id)?;

                let dirty = match oracle.is_dirty(&id) {
                    Ok(dirty) => dirty,
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                };
                if !dirty {
                    plan.states.transition(&id, NodeState::Skipped)?;
                    debug!(node = %id, "up to date");
                    report.skipped.push(id);
                    idx = 0;
                    continue;
                }

                plan.states.transition(&id, NodeState::Executing)?;
                if let Action::Run(_) = node.action {
                    started.insert(id.clone(), self.output_mtime(node)?);
                    let executor = Arc::clone(&self.executor);
                    let node = node.clone();
                    in_flight.spawn(async move {
                        let result = run_external(&*executor, &node).await;
                        (node.id, result)
                    });
                } else {
                    match self.run_internal(node) {
                        Ok(()) => {
                            plan.states.transition(&id, NodeState::Succeeded)?;
                            report.executed.push(id);
                            idx = 0;
                        }
                        Err(err) => {
                            plan.states.transition(&id, NodeState::Failed)?;
                            failure = Some(err);
                        }
                    }
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                if let Some(err) = failure {
                    // Whatever is still executing belonged to a task that panicked.
                    let stranded: Vec<NodeId> = plan
                        .states
                        .in_state(NodeState::Executing)
                        .map(str::to_string)
                        .collect();
                    for id in stranded {
                        plan.states.transition(&id, NodeState::Failed)?;
                        let node = self.registry.resolve(&id)?;
                        self.discard_partial(node, started.remove(&id).flatten());
                    }
                    return Err(abort(&report, err));
                }
                if pending.is_empty() {
                    break;
                }
                return Err(anyhow!("no runnable nodes left but {} still pending", pending.len()).into());
            };

            match joined {
                Ok((id, Ok(()))) => {
                    started.remove(&id);
                    plan.states.transition(&id, NodeState::Succeeded)?;
                    report.executed.push(id);
                }
                Ok((id, Err(err))) => {
                    plan.states.transition(&id, NodeState::Failed)?;
                    let node = self.registry.resolve(&id)?;
                    self.discard_partial(node, started.remove(&id).flatten());
                    if failure.is_none() {
                        failure = Some(err);
                    } else {
                        warn!(node = %id, error = %err, "another action failed while draining");
                    }
                }
                Err(join_err) => {
                    error!(error = %join_err, "action task panicked");
                    if failure.is_none() {
                        failure = Some(anyhow!("action task panicked: {join_err}").into());
                    }
                }
            }
        }

        info!(
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            jobs,
            "pipedag run finished"
        );
        Ok(report)
    }

    /// Print what would run, without touching anything.
    fn dry_run(&self, plan: &Plan) -> Result<RunReport> {
        let mut oracle = StalenessOracle::new(&self.registry, &*self.fs);
        let mut report = RunReport::default();

        println!("pipedag dry-run ({} nodes planned)", plan.len());
        for id in &plan.order {
            let node = self.registry.resolve(id)?;
            let dirty = match oracle.is_dirty(id) {
                Ok(dirty) => dirty,
                Err(PipelineError::MissingPrerequisite { prerequisite, .. }) => {
                    println!("  ! {id}: missing prerequisite {prerequisite}");
                    true
                }
                Err(err) => return Err(err),
            };
            if !dirty {
                report.skipped.push(id.clone());
                continue;
            }

            println!("  - {id}");
            match &node.action {
                Action::None => {}
                Action::CreateDir => println!("      mkdir -p {id}"),
                Action::Symlink { target } => println!("      ln -s {} {id}", target.display()),
                Action::Run(commands) => {
                    for cmd in commands {
                        println!("      {cmd}");
                    }
                }
            }
            report.executed.push(id.clone());
        }

        debug!("dry-run complete (no execution)");
        Ok(report)
    }

    /// Current mtime of a file node's artifact, taken before its commands run.
    fn output_mtime(&self, node: &ArtifactNode) -> Result<Option<SystemTime>> {
        if node.kind != NodeKind::File {
            return Ok(None);
        }
        Ok(self.fs.modified(node.path())?)
    }

    /// Remove a file node's artifact if its failed action created or
    /// rewrote it, so the next run does not take it as up to date.
    fn discard_partial(&self, node: &ArtifactNode, before: Option<SystemTime>) {
        if node.kind != NodeKind::File {
            return;
        }
        let path = node.path();
        let after = match self.fs.modified(path) {
            Ok(Some(mtime)) => Some(mtime),
            Ok(None) if self.fs.is_symlink(path) => None,
            Ok(None) => return,
            Err(err) => {
                warn!(node = %node.id, error = %err, "cannot stat output of failed action");
                return;
            }
        };
        if before.is_some() && after == before {
            return;
        }
        match self.fs.remove_file(path) {
            Ok(()) => warn!(node = %node.id, "removed output of failed action"),
            Err(err) => error!(node = %node.id, error = %err, "cannot remove output of failed action"),
        }
    }

    fn run_internal(&self, node: &ArtifactNode) -> Result<()> {
        match &node.action {
            Action::None => Ok(()),
            Action::CreateDir => {
                info!(node = %node.id, "creating directory");
                self.fs.create_dir_all(node.path())?;
                Ok(())
            }
            Action::Symlink { target } => {
                if self.fs.exists(node.path()) {
                    debug!(node = %node.id, "symlink target already present");
                    return Ok(());
                }
                info!(node = %node.id, link_target = %target.display(), "creating symlink");
                self.fs.symlink(target, node.path())?;
                Ok(())
            }
            Action::Run(_) => Err(anyhow!("'{}' runs commands, not an internal action", node.id).into()),
        }
    }
}

/// Run a node's commands in order; the first non-zero exit fails the node.
async fn run_external<E: ExecutorBackend + ?Sized>(executor: &E, node: &ArtifactNode) -> Result<()> {
    let Action::Run(commands) = &node.action else {
        return Ok(());
    };

    info!(node = %node.id, commands = commands.len(), "building");
    for command in commands {
        let invocation = LeafInvocation {
            node: node.id.clone(),
            kind: node.kind,
            command: command.clone(),
        };
        match executor.execute(invocation).await? {
            ActionOutcome::Success => {}
            ActionOutcome::Failed(status) => {
                error!(node = %node.id, program = %command.program, status, "action failed");
                return Err(PipelineError::ActionFailed {
                    node: node.id.clone(),
                    status,
                });
            }
        }
    }
    Ok(())
}

fn abort(report: &RunReport, err: PipelineError) -> PipelineError {
    error!(
        error = %err,
        completed = report.executed.len(),
        "run aborted"
    );
    for id in &report.executed {
        info!(node = %id, "completed before abort");
    }
    err
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::path::Path;
    use std::pin::Pin;

    use super::*;
    use crate::exec::CommandSpec;
    use crate::fs::mock::MockFileSystem;

    /// Behaves according to the node name: `boom` panics, `partial` writes
    /// half an output and fails, `untouched` fails without writing.
    struct ScriptedExecutor {
        fs: MockFileSystem,
    }

    impl ExecutorBackend for ScriptedExecutor {
        fn execute(
            &self,
            invocation: LeafInvocation,
        ) -> Pin<Box<dyn Future<Output = Result<ActionOutcome>> + Send + '_>> {
            Box::pin(async move {
                match invocation.node.as_str() {
                    "boom" => panic!("executor crashed"),
                    "partial" => {
                        self.fs.write(Path::new("partial"), b"half")?;
                        Ok(ActionOutcome::Failed(3))
                    }
                    "untouched" => Ok(ActionOutcome::Failed(4)),
                    _ => Ok(ActionOutcome::Success),
                }
            })
        }
    }

    fn runtime(fs: &MockFileSystem, ids: &[&str]) -> Runtime<ScriptedExecutor> {
        let mut registry = Registry::new();
        for id in ids {
            let action = Action::Run(vec![CommandSpec::new(format!("make-{id}"))]);
            registry.register(ArtifactNode::file(id, action)).unwrap();
        }
        Runtime::new(
            registry,
            Arc::new(fs.clone()),
            Arc::new(ScriptedExecutor { fs: fs.clone() }),
            RunConfig::default(),
        )
    }

    fn plan(runtime: &Runtime<ScriptedExecutor>, targets: &[&str]) -> Plan {
        let targets: Vec<NodeId> = targets.iter().map(|t| t.to_string()).collect();
        Scheduler::new(&runtime.registry).plan(&targets).unwrap()
    }

    #[tokio::test]
    async fn panicked_action_leaves_its_node_failed() {
        let fs = MockFileSystem::new();
        let runtime = runtime(&fs, &["boom", "fine"]);
        let mut plan = plan(&runtime, &["boom", "fine"]);

        let err = runtime.run_parallel(&mut plan, 2).await.unwrap_err();

        assert!(err.to_string().contains("panicked"), "{err}");
        assert_eq!(plan.states.get("boom"), NodeState::Failed);
        assert_eq!(plan.states.get("fine"), NodeState::Succeeded);
        assert_eq!(plan.states.in_state(NodeState::Executing).count(), 0);
    }

    #[tokio::test]
    async fn output_written_by_a_failed_action_is_removed() {
        let fs = MockFileSystem::new();
        let runtime = runtime(&fs, &["partial"]);
        let mut plan = plan(&runtime, &["partial"]);

        let err = runtime.run_sequential(&mut plan).await.unwrap_err();

        assert!(matches!(err, PipelineError::ActionFailed { status: 3, .. }));
        assert_eq!(plan.states.get("partial"), NodeState::Failed);
        assert!(!fs.exists(Path::new("partial")));
    }

    #[tokio::test]
    async fn failed_action_keeps_an_output_it_did_not_touch() {
        let fs = MockFileSystem::new();
        fs.add_file("in", "");
        let mut registry = Registry::new();
        registry
            .register(
                ArtifactNode::file("untouched", Action::Run(vec![CommandSpec::new("make")]))
                    .depends_on("in"),
            )
            .unwrap();
        fs.add_file("untouched", "old");
        fs.touch("in");
        let runtime = Runtime::new(
            registry,
            Arc::new(fs.clone()),
            Arc::new(ScriptedExecutor { fs: fs.clone() }),
            RunConfig::default(),
        );
        let mut plan = plan(&runtime, &["untouched"]);

        let err = runtime.run_parallel(&mut plan, 2).await.unwrap_err();

        assert!(matches!(err, PipelineError::ActionFailed { status: 4, .. }));
        assert_eq!(fs.read_to_string(Path::new("untouched")).unwrap(), "old");
    }
}
