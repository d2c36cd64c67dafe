//! Dependency Context
//!
//! The context store maps node ids to the value each node produced last.
//! It is the memo that lets an incremental rerun skip unaffected nodes: a
//! node that does not run keeps its stored value, and its dependents read
//! that value instead of recomputing it.
//!
//! A [`NodeCx`] is what a node body sees while it runs. It provides the
//! node's arguments, read access to the store, the session's input table,
//! and sinks for emitted output units and printed lines. Reads of ids the node did not
//! declare are recorded so the engine can add the edge afterwards.

use indexmap::IndexMap;

use super::node::NodeId;
use crate::error::NodeError;
use crate::render::{InputTable, OutputUnit, UnitId};
use crate::script::Deadline;
use crate::value::Value;

/// Last produced value of every node.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    values: IndexMap<NodeId, Value>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Value> {
        self.values.get(id)
    }

    pub(crate) fn set(&mut self, id: NodeId, value: Value) {
        self.values.insert(id, value);
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Value)> {
        self.values.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }
}

/// Execution context handed to a node body.
pub struct NodeCx<'a> {
    node: &'a NodeId,
    args: Vec<Value>,
    context: &'a ContextStore,
    inputs: &'a InputTable,
    deadline: Option<Deadline>,
    reads: Vec<NodeId>,
    emitted: Vec<OutputUnit>,
    printed: Vec<String>,
}

impl<'a> NodeCx<'a> {
    pub(crate) fn new(
        node: &'a NodeId,
        args: Vec<Value>,
        context: &'a ContextStore,
        inputs: &'a InputTable,
        deadline: Option<Deadline>,
    ) -> Self {
        Self {
            node,
            args,
            context,
            inputs,
            deadline,
            reads: Vec::new(),
            emitted: Vec::new(),
            printed: Vec::new(),
        }
    }

    /// Id of the running node.
    pub fn node(&self) -> &NodeId {
        self.node
    }

    /// Values of the declared dependencies, in declaration order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Read another node's value. The read is recorded so the engine can
    /// add a dependency edge if it was not declared.
    pub fn read(&mut self, id: &NodeId) -> Option<Value> {
        if !self.reads.contains(id) {
            self.reads.push(id.clone());
        }
        self.context.get(id).cloned()
    }

    /// Current value of an input unit.
    pub fn input(&self, unit: &UnitId) -> Option<Value> {
        self.inputs.get(unit).cloned()
    }

    /// Emit an output unit owned by this node.
    pub fn emit(&mut self, unit: OutputUnit) {
        self.emitted.push(unit);
    }

    /// Write one line of console output on behalf of this node.
    pub fn print(&mut self, line: impl Into<String>) {
        self.printed.push(line.into());
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    /// Fail with a timeout once the deadline has passed.
    pub fn check_deadline(&self) -> Result<(), NodeError> {
        match self.deadline {
            Some(deadline) if std::time::Instant::now() >= deadline.at => {
                Err(NodeError::Timeout(deadline.limit))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<NodeId>, Vec<OutputUnit>, Vec<String>) {
        (self.reads, self.emitted, self.printed)
    }
}
