//! Workflow Engine
//!
//! The workflow owns the dependency graph, the context store, and the
//! producer map from output units to the nodes that emit them. It decides
//! which nodes run and in what order.
//!
//! # Algorithm
//!
//! Execution is a topological walk over the whole graph:
//!
//! 1. Order all nodes with Kahn's algorithm; ties go to the smallest id, so
//!    independent statements keep their source order
//! 2. Walk the order, running a node only if it is selected:
//!    - every node on a cold start
//!    - otherwise, nodes in the recompute set, nodes flagged
//!      `force_recompute`, and failed nodes whose retry policy allows
//!      another attempt
//! 3. A selected node with a failed dependency is marked failed without
//!    being invoked. The dependency may have failed in this walk or in an
//!    earlier one and not been selected since
//! 4. A node that is not selected keeps its stored value, which its
//!    dependents read as their argument
//!
//! The recompute set for an input change is the forward closure of the
//! nodes producing the changed units, see [`Workflow::affected`].

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::analyzer::{GraphAnalyzer, GraphPayload};
use super::context::{ContextStore, NodeCx};
use super::node::{Atom, NodeBody, NodeId, NodeStatus};
use crate::config::{EngineConfig, RetryPolicy};
use crate::error::{GraphError, NodeError};
use crate::render::{InputTable, OutputUnit, UnitId};
use crate::script::Deadline;
use crate::value::Value;

/// What one call to [`Workflow::execute`] did.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Nodes that ran and completed, in execution order.
    pub executed: Vec<NodeId>,
    /// Nodes that ran and failed.
    pub failed: Vec<NodeId>,
    /// Nodes that were not invoked because a dependency failed.
    pub blocked: Vec<NodeId>,
    /// Units emitted by each completed node.
    pub outputs: Vec<(NodeId, Vec<OutputUnit>)>,
    /// Lines printed by each attempt, failed attempts included.
    pub printed: Vec<(NodeId, Vec<String>)>,
}

impl ExecutionReport {
    /// Number of node bodies invoked.
    pub fn invoked(&self) -> usize {
        self.executed.len() + self.failed.len()
    }

    /// Nodes whose previous output is no longer valid.
    pub fn invalidated(&self) -> impl Iterator<Item = &NodeId> {
        self.failed.iter().chain(self.blocked.iter())
    }
}

/// The workflow manages the dependency graph and coordinates execution.
pub struct Workflow {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Atom>,
    context: ContextStore,
    producers: IndexMap<UnitId, NodeId>,
    default_retry: Option<RetryPolicy>,
    node_timeout: Option<Duration>,
}

impl Workflow {
    /// Create a new empty workflow.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            context: ContextStore::new(),
            producers: IndexMap::new(),
            default_retry: None,
            node_timeout: None,
        }
    }

    /// Create a workflow using the retry and timeout settings of `config`.
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            default_retry: config.retry.clone(),
            node_timeout: config.node_timeout,
            ..Self::new()
        }
    }

    /// Register a node, or redefine an existing one.
    ///
    /// Re-registering keeps the node's status, attempts and stored value
    /// and replaces its body and dependencies. Dependencies that are not
    /// registered yet get a placeholder stub. An edge that would close a
    /// cycle is rejected and leaves the graph untouched.
    pub fn register(
        &mut self,
        id: impl Into<NodeId>,
        dependencies: impl IntoIterator<Item = NodeId>,
        body: NodeBody,
    ) -> Result<(), GraphError> {
        let id = id.into();
        let mut params: Vec<NodeId> = Vec::new();
        for dep in dependencies {
            if !params.contains(&dep) {
                params.push(dep);
            }
        }

        if params.contains(&id) {
            return Err(GraphError::Cycle {
                node: id.clone(),
                dependency: id,
            });
        }
        if self.nodes.contains_key(&id) {
            let downstream = self.affected([&id]);
            if let Some(dep) = params.iter().find(|d| downstream.contains(*d)) {
                return Err(GraphError::Cycle {
                    node: id,
                    dependency: dep.clone(),
                });
            }
        }

        for dep in &params {
            if !self.nodes.contains_key(dep) {
                warn!(node = %id, dependency = %dep, "dependency is not registered yet; inserting placeholder");
                self.nodes.insert(dep.clone(), Atom::placeholder(dep.clone()));
            }
        }

        match self.nodes.get_mut(&id) {
            Some(node) => {
                for dropped in node.redefine(params.clone(), body) {
                    if let Some(dep) = self.nodes.get_mut(&dropped) {
                        dep.remove_dependent(&id);
                    }
                }
            }
            None => {
                self.nodes
                    .insert(id.clone(), Atom::new(id.clone(), params.clone(), body));
            }
        }
        for dep in &params {
            if let Some(node) = self.nodes.get_mut(dep) {
                node.add_dependent(id.clone());
            }
        }

        debug!(node = %id, dependencies = params.len(), "registered node");
        Ok(())
    }

    /// Add a dependency edge: `node` depends on `dependency`.
    ///
    /// Returns whether the edge is new.
    pub fn add_dependency(&mut self, node: &NodeId, dependency: &NodeId) -> Result<bool, GraphError> {
        if !self.nodes.contains_key(node) {
            return Err(GraphError::UnknownNode(node.clone()));
        }
        if node == dependency || self.affected([node]).contains(dependency) {
            return Err(GraphError::Cycle {
                node: node.clone(),
                dependency: dependency.clone(),
            });
        }
        if !self.nodes.contains_key(dependency) {
            warn!(node = %node, dependency = %dependency, "dependency is not registered yet; inserting placeholder");
            self.nodes
                .insert(dependency.clone(), Atom::placeholder(dependency.clone()));
        }

        let added = self
            .nodes
            .get_mut(node)
            .is_some_and(|n| n.add_dependency(dependency.clone()));
        if added {
            if let Some(dep) = self.nodes.get_mut(dependency) {
                dep.add_dependent(node.clone());
            }
        }
        Ok(added)
    }

    /// Attach a retry policy to one node.
    pub fn set_retry_policy(&mut self, id: &NodeId, policy: Option<RetryPolicy>) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;
        node.set_retry_policy(policy);
        Ok(())
    }

    /// Flag nodes to run on the next execution regardless of the recompute
    /// set. Unknown ids are ignored.
    pub fn mark_force_recompute<'a>(&mut self, ids: impl IntoIterator<Item = &'a NodeId>) {
        for id in ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.mark_force_recompute();
            }
        }
    }

    /// The forward closure of `changed`: every node reachable through
    /// dependent edges, including the changed nodes themselves. Unknown ids
    /// are ignored.
    pub fn affected<'a>(&self, changed: impl IntoIterator<Item = &'a NodeId>) -> BTreeSet<NodeId> {
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<&NodeId> = changed.into_iter().collect();

        // BFS along dependent edges
        while let Some(id) = queue.pop_front() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !visited.insert(id.clone()) {
                continue;
            }
            queue.extend(node.dependents().iter());
        }

        visited
    }

    /// All node ids in a stable topological order: dependencies before
    /// dependents, ties broken by id.
    pub fn order(&self) -> Vec<NodeId> {
        let mut in_degree: HashMap<&NodeId, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (id, node.dependencies().len()))
            .collect();
        let mut ready: BTreeSet<&NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        // Kahn's algorithm
        while let Some(id) = ready.pop_first() {
            result.push(id.clone());
            for dependent in self.nodes[id].dependents() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        result
    }

    /// Run nodes in dependency order.
    ///
    /// With `recompute == None` every node runs. Otherwise only the nodes in
    /// the set run, together with forced nodes and failed nodes that may be
    /// retried. Node failures are recorded on the nodes and never abort the
    /// walk.
    pub fn execute(&mut self, recompute: Option<&BTreeSet<NodeId>>, inputs: &InputTable) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let mut failed: HashSet<NodeId> = HashSet::new();

        for id in self.order() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let selected = match recompute {
                None => true,
                Some(set) => {
                    set.contains(&id)
                        || node.force_recompute()
                        || node.wants_retry(self.default_retry.as_ref())
                }
            };
            if !selected {
                continue;
            }

            // A dependency that was not selected still holds its last status
            let upstream = node
                .dependencies()
                .iter()
                .find(|dep| {
                    failed.contains(*dep)
                        || self
                            .nodes
                            .get(*dep)
                            .is_some_and(|dep| dep.status() == NodeStatus::Error)
                })
                .cloned();
            if let Some(upstream) = upstream {
                debug!(node = %id, upstream = %upstream, "skipping node with failed dependency");
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.record_skipped(NodeError::UpstreamFailed(upstream));
                    node.settle();
                }
                failed.insert(id.clone());
                report.blocked.push(id);
                continue;
            }

            if !self.run_node(&id, inputs, &mut report) {
                failed.insert(id);
            }
        }

        debug!(
            executed = report.executed.len(),
            failed = report.failed.len(),
            blocked = report.blocked.len(),
            "execution finished"
        );
        report
    }

    /// Run one node, retrying inline as its policy allows. Returns whether
    /// it completed.
    fn run_node(&mut self, id: &NodeId, inputs: &InputTable, report: &mut ExecutionReport) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        node.mark_running();
        let body = node.body();
        let policy = node
            .retry_policy()
            .cloned()
            .or_else(|| self.default_retry.clone());
        let args: Vec<Value> = node
            .params()
            .iter()
            .map(|param| self.context.get(param).cloned().unwrap_or_default())
            .collect();
        let max_attempts = policy.as_ref().map_or(1, |p| p.max_attempts.max(1));

        let mut attempt = 0;
        loop {
            attempt += 1;
            let deadline = self.node_timeout.map(Deadline::after);
            let started = Instant::now();
            let mut cx = NodeCx::new(id, args.clone(), &self.context, inputs, deadline);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut cx)));
            let elapsed = started.elapsed();
            let (reads, emitted, printed) = cx.into_parts();
            if !printed.is_empty() {
                report.printed.push((id.clone(), printed));
            }

            let result = match outcome {
                Ok(Ok(_)) if self.node_timeout.is_some_and(|limit| elapsed > limit) => {
                    Err(NodeError::Timeout(self.node_timeout.unwrap_or_default()))
                }
                Ok(result) => result,
                Err(payload) => Err(NodeError::Panicked(panic_message(payload.as_ref()))),
            };

            match result {
                Ok(value) => {
                    self.record_reads(id, reads);
                    for unit in &emitted {
                        self.record_producer(&unit.id, id);
                    }
                    self.context.set(id.clone(), value);
                    if let Some(node) = self.nodes.get_mut(id) {
                        node.record_attempt(elapsed, Ok(()));
                    }
                    report.executed.push(id.clone());
                    report.outputs.push((id.clone(), emitted));
                    return true;
                }
                Err(err) => {
                    warn!(node = %id, attempt, error = %err, "node failed");
                    if let Some(node) = self.nodes.get_mut(id) {
                        node.record_attempt(elapsed, Err(err));
                    }
                    if attempt < max_attempts {
                        if let Some(policy) = &policy {
                            std::thread::sleep(policy.delay_after(attempt));
                        }
                        continue;
                    }
                    if let Some(node) = self.nodes.get_mut(id) {
                        node.settle();
                    }
                    report.failed.push(id.clone());
                    return false;
                }
            }
        }
    }

    /// Turn undeclared reads into dependency edges.
    fn record_reads(&mut self, id: &NodeId, reads: Vec<NodeId>) {
        for read in reads {
            let known = self
                .nodes
                .get(id)
                .is_some_and(|node| node.dependencies().contains(&read));
            if known || !self.nodes.contains_key(&read) {
                continue;
            }
            match self.add_dependency(id, &read) {
                Ok(_) => debug!(node = %id, dependency = %read, "recorded dependency from read"),
                Err(err) => warn!(node = %id, dependency = %read, error = %err, "rejected dependency from read"),
            }
        }
    }

    fn record_producer(&mut self, unit: &UnitId, node: &NodeId) {
        if let Some(previous) = self.producers.insert(unit.clone(), node.clone()) {
            if &previous != node {
                warn!(unit = %unit, previous = %previous, producer = %node, "unit produced by more than one node");
            }
        }
    }

    /// The node that emitted `unit` most recently.
    pub fn producer_of(&self, unit: &UnitId) -> Option<&NodeId> {
        self.producers.get(unit)
    }

    /// Drop every node, stored value and producer mapping.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.context.clear();
        self.producers.clear();
    }

    /// Look up a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&Atom> {
        self.nodes.get(id)
    }

    /// All nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &Atom> {
        self.nodes.values()
    }

    /// Whether a node with this id is registered.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Stored value of a node.
    pub fn value(&self, id: &NodeId) -> Option<&Value> {
        self.context.get(id)
    }

    /// The store of last produced values.
    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Get the total number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The introspection payload for this graph.
    pub fn snapshot(&self) -> GraphPayload {
        GraphAnalyzer::new(self).payload()
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::graph::NodeStatus;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn constant(v: i64) -> NodeBody {
        Arc::new(move |_| Ok(Value::from(v)))
    }

    /// Sum of all arguments plus one.
    fn increment() -> NodeBody {
        Arc::new(|cx| {
            let total: f64 = cx.args().iter().filter_map(Value::as_f64).sum();
            Ok(Value::Number(total + 1.0))
        })
    }

    fn counting(counter: Arc<AtomicUsize>, v: i64) -> NodeBody {
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from(v))
        })
    }

    fn set(ids: &[&str]) -> BTreeSet<NodeId> {
        ids.iter().map(|s| id(s)).collect()
    }

    #[test]
    fn register_and_execute_chain() {
        let mut wf = Workflow::new();
        wf.register("a", [], constant(5)).unwrap();
        wf.register("b", [id("a")], increment()).unwrap();
        wf.register("c", [id("b")], increment()).unwrap();

        let report = wf.execute(None, &InputTable::new());
        assert_eq!(report.executed, vec![id("a"), id("b"), id("c")]);
        assert_eq!(wf.value(&id("c")), Some(&Value::from(7)));
    }

    #[test]
    fn order_breaks_ties_by_id() {
        let mut wf = Workflow::new();
        wf.register("z", [], constant(1)).unwrap();
        wf.register("m", [id("z")], increment()).unwrap();
        wf.register("a", [], constant(1)).unwrap();

        assert_eq!(wf.order(), vec![id("a"), id("z"), id("m")]);
    }

    #[test]
    fn affected_is_forward_closure() {
        let mut wf = Workflow::new();
        wf.register("a", [], constant(1)).unwrap();
        wf.register("b", [id("a")], increment()).unwrap();
        wf.register("c", [id("b")], increment()).unwrap();
        wf.register("d", [], constant(1)).unwrap();

        assert_eq!(wf.affected([&id("b")]), set(&["b", "c"]));
        assert_eq!(wf.affected([&id("a")]), set(&["a", "b", "c"]));
        assert!(wf.affected([&id("unknown")]).is_empty());
    }

    #[test]
    fn selective_execute_leaves_others_untouched() {
        let mut wf = Workflow::new();
        let calls = Arc::new(AtomicUsize::new(0));
        wf.register("a", [], constant(5)).unwrap();
        wf.register("b", [id("a")], increment()).unwrap();
        wf.register("c", [], counting(Arc::clone(&calls), 3)).unwrap();
        wf.execute(None, &InputTable::new());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let affected = wf.affected([&id("a")]);
        let report = wf.execute(Some(&affected), &InputTable::new());
        assert_eq!(report.executed, vec![id("a"), id("b")]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(wf.node(&id("c")).unwrap().attempts(), 1);
        assert_eq!(wf.value(&id("c")), Some(&Value::from(3)));
    }

    #[test]
    fn empty_recompute_set_invokes_nothing() {
        let mut wf = Workflow::new();
        wf.register("a", [], constant(1)).unwrap();
        wf.execute(None, &InputTable::new());

        let report = wf.execute(Some(&BTreeSet::new()), &InputTable::new());
        assert_eq!(report.invoked(), 0);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut wf = Workflow::new();
        wf.register("a", [], constant(1)).unwrap();
        wf.register("b", [id("a")], increment()).unwrap();

        let err = wf.register("a", [id("b")], increment()).unwrap_err();
        assert_eq!(
            err,
            GraphError::Cycle {
                node: id("a"),
                dependency: id("b")
            }
        );
        // The rejected registration left the graph as it was
        assert!(wf.node(&id("a")).unwrap().dependencies().is_empty());

        assert!(wf.register("s", [id("s")], increment()).is_err());
    }

    #[test]
    fn reregistration_keeps_history() {
        let mut wf = Workflow::new();
        wf.register("a", [], constant(1)).unwrap();
        wf.execute(None, &InputTable::new());

        wf.register("a", [], constant(2)).unwrap();
        let node = wf.node(&id("a")).unwrap();
        assert_eq!(node.attempts(), 1);
        assert_eq!(node.status(), NodeStatus::Completed);
        assert_eq!(wf.value(&id("a")), Some(&Value::from(1)));
        assert_eq!(wf.len(), 1);
    }

    #[test]
    fn unknown_dependency_becomes_placeholder() {
        let mut wf = Workflow::new();
        wf.register("b", [id("later")], increment()).unwrap();
        assert!(wf.node(&id("later")).unwrap().is_placeholder());

        wf.register("later", [], constant(10)).unwrap();
        assert!(!wf.node(&id("later")).unwrap().is_placeholder());

        wf.execute(None, &InputTable::new());
        assert_eq!(wf.value(&id("b")), Some(&Value::from(11)));
    }

    #[test]
    fn failures_block_dependents_but_not_siblings() {
        let mut wf = Workflow::new();
        wf.register("a", [], Arc::new(|_| Err(NodeError::custom("boom")))).unwrap();
        wf.register("b", [id("a")], increment()).unwrap();
        wf.register("c", [], constant(1)).unwrap();

        let report = wf.execute(None, &InputTable::new());
        assert_eq!(report.failed, vec![id("a")]);
        assert_eq!(report.blocked, vec![id("b")]);
        assert_eq!(report.executed, vec![id("c")]);

        let b = wf.node(&id("b")).unwrap();
        assert_eq!(b.status(), NodeStatus::Error);
        assert_eq!(b.attempts(), 0);
        assert_eq!(b.last_error(), Some(&NodeError::UpstreamFailed(id("a"))));
    }

    #[test]
    fn failure_from_an_earlier_walk_still_blocks() {
        let mut wf = Workflow::new();
        let calls = Arc::new(AtomicUsize::new(0));
        wf.register("a", [], Arc::new(|_| Err(NodeError::custom("boom")))).unwrap();
        wf.register("e", [], constant(1)).unwrap();
        wf.register("t", [id("a"), id("e")], counting(Arc::clone(&calls), 0)).unwrap();
        wf.execute(None, &InputTable::new());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Only the healthy branch changes; `a` is not selected
        let affected = wf.affected([&id("e")]);
        let report = wf.execute(Some(&affected), &InputTable::new());
        assert_eq!(report.executed, vec![id("e")]);
        assert_eq!(report.blocked, vec![id("t")]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            wf.node(&id("t")).unwrap().last_error(),
            Some(&NodeError::UpstreamFailed(id("a")))
        );
    }

    #[test]
    fn printed_lines_are_reported_per_node() {
        let mut wf = Workflow::new();
        wf.register(
            "a",
            [],
            Arc::new(|cx| {
                cx.print("hello");
                Err(NodeError::custom("after print"))
            }),
        )
        .unwrap();
        wf.register("b", [], constant(1)).unwrap();

        let report = wf.execute(None, &InputTable::new());
        assert_eq!(report.printed, vec![(id("a"), vec!["hello".to_string()])]);
    }

    #[test]
    fn panics_are_caught() {
        let mut wf = Workflow::new();
        wf.register("a", [], Arc::new(|_| panic!("kaboom"))).unwrap();

        let report = wf.execute(None, &InputTable::new());
        assert_eq!(report.failed, vec![id("a")]);
        assert_eq!(
            wf.node(&id("a")).unwrap().last_error(),
            Some(&NodeError::Panicked("kaboom".into()))
        );
    }

    #[test]
    fn retry_policy_reattempts_inline() {
        let mut wf = Workflow::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        wf.register(
            "flaky",
            [],
            Arc::new(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(NodeError::custom("not yet"))
                } else {
                    Ok(Value::from(1))
                }
            }),
        )
        .unwrap();
        wf.set_retry_policy(&id("flaky"), Some(RetryPolicy::new(3, Duration::ZERO, 1.0)))
            .unwrap();

        let report = wf.execute(None, &InputTable::new());
        assert_eq!(report.executed, vec![id("flaky")]);
        assert_eq!(wf.node(&id("flaky")).unwrap().attempts(), 3);
    }

    #[test]
    fn failed_node_with_policy_retries_on_later_execute() {
        let mut wf = Workflow::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        wf.register(
            "flaky",
            [],
            Arc::new(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(NodeError::custom("first call fails"))
                } else {
                    Ok(Value::from(1))
                }
            }),
        )
        .unwrap();
        wf.register("other", [], constant(2)).unwrap();
        wf.set_retry_policy(&id("flaky"), Some(RetryPolicy::new(1, Duration::ZERO, 1.0)))
            .unwrap();

        wf.execute(None, &InputTable::new());
        assert_eq!(wf.node(&id("flaky")).unwrap().status(), NodeStatus::Error);

        // "flaky" is outside the recompute set but is retried anyway
        let report = wf.execute(Some(&set(&["other"])), &InputTable::new());
        assert_eq!(report.executed, vec![id("flaky"), id("other")]);
    }

    #[test]
    fn force_recompute_runs_outside_the_set() {
        let mut wf = Workflow::new();
        let calls = Arc::new(AtomicUsize::new(0));
        wf.register("a", [], counting(Arc::clone(&calls), 1)).unwrap();
        wf.execute(None, &InputTable::new());

        wf.mark_force_recompute([&id("a")]);
        wf.execute(Some(&BTreeSet::new()), &InputTable::new());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!wf.node(&id("a")).unwrap().force_recompute());
    }

    #[test]
    fn overrunning_node_times_out() {
        let config = EngineConfig::default().with_node_timeout(Duration::from_millis(5));
        let mut wf = Workflow::with_config(&config);
        wf.register(
            "slow",
            [],
            Arc::new(|_| {
                std::thread::sleep(Duration::from_millis(30));
                Ok(Value::Null)
            }),
        )
        .unwrap();

        wf.execute(None, &InputTable::new());
        assert_eq!(
            wf.node(&id("slow")).unwrap().last_error(),
            Some(&NodeError::Timeout(Duration::from_millis(5)))
        );
    }

    #[test]
    fn undeclared_reads_become_edges() {
        let mut wf = Workflow::new();
        wf.register("a", [], constant(4)).unwrap();
        wf.register(
            "b",
            [],
            Arc::new(|cx| Ok(cx.read(&NodeId::from("a")).unwrap_or_default())),
        )
        .unwrap();

        wf.execute(None, &InputTable::new());
        assert!(wf.node(&id("b")).unwrap().dependencies().contains(&id("a")));
        assert_eq!(wf.affected([&id("a")]), set(&["a", "b"]));
    }

    #[test]
    fn emitted_units_map_to_producers() {
        let mut wf = Workflow::new();
        wf.register(
            "a",
            [],
            Arc::new(|cx| {
                cx.emit(OutputUnit::new(UnitId::from("text-1"), "text", Value::from("hi"), 1.0));
                Ok(Value::Null)
            }),
        )
        .unwrap();

        let report = wf.execute(None, &InputTable::new());
        assert_eq!(report.outputs[0].1.len(), 1);
        assert_eq!(wf.producer_of(&UnitId::from("text-1")), Some(&id("a")));

        wf.reset();
        assert!(wf.is_empty());
        assert!(wf.producer_of(&UnitId::from("text-1")).is_none());
        assert!(wf.context().is_empty());
    }
}
