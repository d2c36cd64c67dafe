//! Graph Nodes
//!
//! This module defines the nodes ("atoms") that live in the dependency graph.
//! An atom wraps one unit of script work: a top-level statement, a function
//! definition, or a closure registered directly from Rust.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::context::NodeCx;
use crate::config::RetryPolicy;
use crate::error::NodeError;
use crate::value::Value;

/// Stable identifier for a node in the dependency graph.
///
/// Ids produced by the source transformer look like
/// `atom_00003_001_slider` and sort in source order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Execution status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Registered but not yet executed.
    Pending,
    Running,
    Completed,
    Error,
}

/// The callable body of a node.
///
/// It receives its declared dependencies' values positionally through the
/// [`NodeCx`] and returns the node's new value.
pub type NodeBody = Arc<dyn Fn(&mut NodeCx<'_>) -> Result<Value, NodeError> + Send + Sync>;

/// A node in the dependency graph.
pub struct Atom {
    id: NodeId,

    body: NodeBody,

    /// Declared dependencies, in the positional order the body receives
    /// them.
    params: Vec<NodeId>,

    /// Nodes that this node depends on (parents in the DAG): the declared
    /// ones plus any recorded from reads at run time.
    dependencies: BTreeSet<NodeId>,

    /// Nodes that depend on this node (children in the DAG).
    dependents: BTreeSet<NodeId>,

    status: NodeStatus,
    force_recompute: bool,
    attempts: u32,
    last_error: Option<NodeError>,
    last_duration: Option<Duration>,
    retry: Option<RetryPolicy>,

    /// Stand-in for a dependency that has not been registered yet.
    placeholder: bool,
}

impl Atom {
    pub(crate) fn new(id: NodeId, params: Vec<NodeId>, body: NodeBody) -> Self {
        Self {
            id,
            body,
            dependencies: params.iter().cloned().collect(),
            params,
            dependents: BTreeSet::new(),
            status: NodeStatus::Pending,
            force_recompute: false,
            attempts: 0,
            last_error: None,
            last_duration: None,
            retry: None,
            placeholder: false,
        }
    }

    /// A stub standing in for a forward reference. Produces `None`.
    pub(crate) fn placeholder(id: NodeId) -> Self {
        let mut atom = Self::new(id, Vec::new(), Arc::new(|_| Ok(Value::Null)));
        atom.placeholder = true;
        atom
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn params(&self) -> &[NodeId] {
        &self.params
    }

    pub fn dependencies(&self) -> &BTreeSet<NodeId> {
        &self.dependencies
    }

    pub fn dependents(&self) -> &BTreeSet<NodeId> {
        &self.dependents
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&NodeError> {
        self.last_error.as_ref()
    }

    pub fn last_duration(&self) -> Option<Duration> {
        self.last_duration
    }

    pub fn force_recompute(&self) -> bool {
        self.force_recompute
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub(crate) fn body(&self) -> NodeBody {
        Arc::clone(&self.body)
    }

    /// Swap in a new body and declared dependencies, keeping history.
    /// Returns the dependencies that were dropped.
    pub(crate) fn redefine(&mut self, params: Vec<NodeId>, body: NodeBody) -> Vec<NodeId> {
        let next: BTreeSet<NodeId> = params.iter().cloned().collect();
        let dropped = self.dependencies.difference(&next).cloned().collect();
        self.dependencies = next;
        self.params = params;
        self.body = body;
        self.placeholder = false;
        dropped
    }

    pub(crate) fn add_dependency(&mut self, id: NodeId) -> bool {
        self.dependencies.insert(id)
    }

    pub(crate) fn add_dependent(&mut self, id: NodeId) {
        self.dependents.insert(id);
    }

    pub(crate) fn remove_dependent(&mut self, id: &NodeId) {
        self.dependents.remove(id);
    }

    pub(crate) fn set_retry_policy(&mut self, policy: Option<RetryPolicy>) {
        self.retry = policy;
    }

    pub(crate) fn mark_force_recompute(&mut self) {
        self.force_recompute = true;
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = NodeStatus::Running;
    }

    /// Record the outcome of one attempt.
    pub(crate) fn record_attempt(&mut self, elapsed: Duration, outcome: Result<(), NodeError>) {
        self.attempts += 1;
        self.last_duration = Some(elapsed);
        match outcome {
            Ok(()) => {
                self.status = NodeStatus::Completed;
                self.last_error = None;
                self.force_recompute = false;
            }
            Err(err) => {
                self.status = NodeStatus::Error;
                self.last_error = Some(err);
            }
        }
    }

    /// Mark the node failed without invoking it.
    pub(crate) fn record_skipped(&mut self, err: NodeError) {
        self.status = NodeStatus::Error;
        self.last_error = Some(err);
    }

    /// Clear the force flag after a run that did not complete.
    pub(crate) fn settle(&mut self) {
        self.force_recompute = false;
    }

    /// Whether a failed node should be re-attempted on a later rerun.
    pub(crate) fn wants_retry(&self, default: Option<&RetryPolicy>) -> bool {
        self.status == NodeStatus::Error
            && self.retry.as_ref().or(default).is_some()
            && !matches!(self.last_error, Some(NodeError::UpstreamFailed(_)))
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("status", &self.status)
            .field("force_recompute", &self.force_recompute)
            .field("attempts", &self.attempts)
            .field("last_error", &self.last_error)
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}
