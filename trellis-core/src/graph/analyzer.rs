//! Graph Introspection
//!
//! Read-only views over a [`Workflow`]: per-node reports, execution levels
//! (nodes that could run side by side), and the critical path weighted by
//! each node's last execution time.

use std::collections::HashMap;

use serde::Serialize;

use super::node::{NodeId, NodeStatus};
use super::workflow::Workflow;

/// One node as seen by introspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    pub name: NodeId,
    pub status: NodeStatus,
    /// Seconds spent in the last attempt.
    pub execution_time: f64,
    pub attempts: u32,
    pub error: Option<String>,
    pub dependencies: Vec<NodeId>,
    pub force_recompute: bool,
}

/// The visualization payload sent to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphPayload {
    pub nodes: Vec<NodeReport>,
    pub levels: Vec<Vec<NodeId>>,
    pub critical_path: Vec<NodeId>,
}

pub struct GraphAnalyzer<'w> {
    workflow: &'w Workflow,
    order: Vec<NodeId>,
}

impl<'w> GraphAnalyzer<'w> {
    pub fn new(workflow: &'w Workflow) -> Self {
        Self {
            workflow,
            order: workflow.order(),
        }
    }

    /// Reports for every node, in execution order.
    pub fn reports(&self) -> Vec<NodeReport> {
        self.order
            .iter()
            .filter_map(|id| self.workflow.node(id))
            .map(|node| NodeReport {
                name: node.id().clone(),
                status: node.status(),
                execution_time: node.last_duration().map_or(0.0, |d| d.as_secs_f64()),
                attempts: node.attempts(),
                error: node.last_error().map(ToString::to_string),
                dependencies: node.dependencies().iter().cloned().collect(),
                force_recompute: node.force_recompute(),
            })
            .collect()
    }

    /// Group nodes by depth: level 0 has no dependencies, level `n` depends
    /// on something at level `n - 1`.
    pub fn execution_levels(&self) -> Vec<Vec<NodeId>> {
        let mut depth: HashMap<&NodeId, usize> = HashMap::new();
        let mut levels: Vec<Vec<NodeId>> = Vec::new();

        for id in &self.order {
            let Some(node) = self.workflow.node(id) else {
                continue;
            };
            let level = node
                .dependencies()
                .iter()
                .filter_map(|dep| depth.get(dep))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(id.clone());
        }

        levels
    }

    /// The most expensive dependency chain, by last execution time.
    pub fn critical_path(&self) -> Vec<NodeId> {
        let mut cost: HashMap<&NodeId, f64> = HashMap::new();
        let mut via: HashMap<&NodeId, &NodeId> = HashMap::new();
        let mut end: Option<(&NodeId, f64)> = None;

        for id in &self.order {
            let Some(node) = self.workflow.node(id) else {
                continue;
            };
            let weight = node.last_duration().map_or(0.0, |d| d.as_secs_f64());
            let mut best: Option<(&NodeId, f64)> = None;
            for dep in node.dependencies() {
                if let Some((dep_id, dep_cost)) = cost.get_key_value(dep) {
                    if best.map_or(true, |(_, c)| *dep_cost > c) {
                        best = Some((*dep_id, *dep_cost));
                    }
                }
            }
            let total = weight + best.map_or(0.0, |(_, c)| c);
            if let Some((dep, _)) = best {
                via.insert(id, dep);
            }
            cost.insert(id, total);
            if end.map_or(true, |(_, c)| total > c) {
                end = Some((id, total));
            }
        }

        let mut path = Vec::new();
        let mut cursor = end.map(|(id, _)| id);
        while let Some(id) = cursor {
            path.push(id.clone());
            cursor = via.get(id).copied();
        }
        path.reverse();
        path
    }

    pub fn payload(&self) -> GraphPayload {
        GraphPayload {
            nodes: self.reports(),
            levels: self.execution_levels(),
            critical_path: self.critical_path(),
        }
    }
}
