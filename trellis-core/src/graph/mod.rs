//! Dependency Graph
//!
//! This module implements the workflow engine that runs a script as a graph
//! of nodes and recomputes only what an input change can reach.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes ("atoms") wrap one top-level statement or function definition
//! - Edges represent dependencies: if B reads A's value, there is an edge
//!   from A to B
//!
//! When an input changes, the run orchestrator maps it to the node that
//! produced the input unit, asks the workflow for the forward closure of
//! that node, and executes just that set. Every other node keeps its value
//! in the context store.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized in one [`Workflow`] per session, indexed by
//!    node id.
//!
//! 2. Both forward (dependencies) and reverse (dependents) edges are kept,
//!    so the affected set is a plain BFS and ordering is Kahn's algorithm.
//!
//! 3. Node bodies receive their declared dependencies positionally and may
//!    read other values through [`NodeCx::read`]; undeclared reads become
//!    edges.

mod analyzer;
mod context;
mod node;
mod workflow;

pub use analyzer::{GraphAnalyzer, GraphPayload, NodeReport};
pub use context::{ContextStore, NodeCx};
pub use node::{Atom, NodeBody, NodeId, NodeStatus};
pub use workflow::{ExecutionReport, Workflow};
pub(crate) use workflow::panic_message;
