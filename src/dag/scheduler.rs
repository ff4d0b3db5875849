// src/dag/scheduler.rs

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::dag::node::{canonical_id, NodeId};
use crate::dag::registry::Registry;
use crate::dag::state::{NodeState, NodeStates};
use crate::errors::{PipelineError, Result};

/// Ordered execution plan for one run.
///
/// `order` lists every registered node reachable from the requested targets,
/// prerequisites strictly before dependents. All planned nodes start in
/// [`NodeState::Evaluating`]; the runtime finishes their lifecycle.
#[derive(Debug, Clone)]
pub struct Plan {
    pub order: Vec<NodeId>,
    /// Registered prerequisites of each planned node.
    pub deps: HashMap<NodeId, Vec<NodeId>>,
    pub states: NodeStates,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether every planned prerequisite of `id` finished successfully.
    pub fn ready(&self, id: &str) -> bool {
        self.deps
            .get(id)
            .map(|deps| deps.iter().all(|d| self.states.get(d).is_satisfied()))
            .unwrap_or(true)
    }
}

/// Computes the induced subgraph of requested targets and orders it.
#[derive(Debug)]
pub struct Scheduler<'a> {
    registry: &'a Registry,
}

impl<'a> Scheduler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Resolve `targets` and produce a topological order.
    ///
    /// - unknown targets fail with `UnknownTarget` before anything runs
    /// - a prerequisite reached while still `Evaluating` is a cycle
    /// - ties are broken by target order, then prerequisite declaration order
    pub fn plan(&self, targets: &[NodeId]) -> Result<Plan> {
        for target in targets {
            self.registry.resolve(target)?;
        }

        let mut planner = Planner {
            registry: self.registry,
            states: NodeStates::new(),
            finished: HashSet::new(),
            order: Vec::new(),
            deps: HashMap::new(),
            path: Vec::new(),
        };

        for target in targets {
            planner.visit(&canonical_id(target))?;
        }

        debug!(nodes = planner.order.len(), "planned run");

        Ok(Plan {
            order: planner.order,
            deps: planner.deps,
            states: planner.states,
        })
    }
}

struct Planner<'a> {
    registry: &'a Registry,
    states: NodeStates,
    finished: HashSet<NodeId>,
    order: Vec<NodeId>,
    deps: HashMap<NodeId, Vec<NodeId>>,
    path: Vec<NodeId>,
}

impl Planner<'_> {
    fn visit(&mut self, id: &str) -> Result<()> {
        if self.finished.contains(id) {
            return Ok(());
        }
        if self.states.get(id) == NodeState::Evaluating {
            let mut cycle = self.path.clone();
            cycle.push(id.to_string());
            return Err(PipelineError::CycleDetected(cycle.join(" -> ")));
        }

        let registry = self.registry;
        let node = registry.resolve(id)?;
        self.states.transition(&node.id, NodeState::Evaluating)?;
        self.path.push(node.id.clone());

        let mut planned_deps = Vec::new();
        for prereq in node.node_prerequisites() {
            // Unregistered prerequisites are source files checked by the oracle.
            if registry.contains(prereq) {
                self.visit(prereq)?;
                planned_deps.push(prereq.to_string());
            }
        }

        self.path.pop();
        self.finished.insert(node.id.clone());
        self.deps.insert(node.id.clone(), planned_deps);
        self.order.push(node.id.clone());
        Ok(())
    }
}
