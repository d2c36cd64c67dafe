//! View State
//!
//! The units currently on screen, grouped by the node that produced them.
//! A node that reruns replaces its whole segment, so units it no longer
//! emits disappear. Segments are laid out in execution order.

use indexmap::IndexMap;

use crate::graph::NodeId;
use crate::render::{OutputUnit, UnitId};

/// Segment key for a whole-script run.
pub const SCRIPT_SEGMENT: &str = "__script__";

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    segments: IndexMap<NodeId, Vec<OutputUnit>>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the units owned by `node`.
    pub fn replace(&mut self, node: NodeId, units: Vec<OutputUnit>) {
        if units.is_empty() {
            self.segments.shift_remove(&node);
        } else {
            self.segments.insert(node, units);
        }
    }

    /// Drop the units owned by `node`.
    pub fn remove(&mut self, node: &NodeId) -> Option<Vec<OutputUnit>> {
        self.segments.shift_remove(node)
    }

    /// All units, segments ordered by `order`. Segments not named in
    /// `order` follow in insertion order.
    pub fn units(&self, order: &[NodeId]) -> Vec<OutputUnit> {
        let mut units = Vec::new();
        for id in order {
            if let Some(segment) = self.segments.get(id) {
                units.extend(segment.iter().cloned());
            }
        }
        for (id, segment) in &self.segments {
            if !order.contains(id) {
                units.extend(segment.iter().cloned());
            }
        }
        units
    }

    pub fn contains_unit(&self, unit: &UnitId) -> bool {
        self.segments
            .values()
            .flatten()
            .any(|placed| &placed.id == unit)
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn unit(id: &str) -> OutputUnit {
        OutputUnit::new(UnitId::from(id), "text", Value::from(id), 1.0)
    }

    fn ids(units: &[OutputUnit]) -> Vec<&str> {
        units.iter().map(|u| u.id.as_str()).collect()
    }

    #[test]
    fn segments_follow_execution_order() {
        let mut view = ViewState::new();
        view.replace(NodeId::from("b"), vec![unit("b1")]);
        view.replace(NodeId::from("a"), vec![unit("a1"), unit("a2")]);

        let order = [NodeId::from("a"), NodeId::from("b")];
        assert_eq!(ids(&view.units(&order)), vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn replacing_drops_stale_units() {
        let mut view = ViewState::new();
        let a = NodeId::from("a");
        view.replace(a.clone(), vec![unit("a1"), unit("a2")]);
        view.replace(a.clone(), vec![unit("a2")]);
        assert!(!view.contains_unit(&UnitId::from("a1")));

        view.replace(a.clone(), Vec::new());
        assert!(view.is_empty());
    }

    #[test]
    fn unordered_segments_come_last() {
        let mut view = ViewState::new();
        view.replace(NodeId::from(SCRIPT_SEGMENT), vec![unit("s")]);
        view.replace(NodeId::from("a"), vec![unit("a1")]);
        assert_eq!(ids(&view.units(&[NodeId::from("a")])), vec!["a1", "s"]);
    }
}
