//! Layout Packer
//!
//! Packs emitted units into rows by their declared relative width. A row is
//! closed when the next unit would push it past 1.0, when it is exactly
//! full, or when a row-break unit arrives. Each placed unit gets a flex
//! value, its share of the row's total width.

use serde::ser::{Serialize, SerializeStruct, Serializer};

use super::unit::OutputUnit;

/// Slack for width comparisons, so that e.g. three 1/3 units fill a row.
const TOLERANCE: f64 = 1e-9;

/// A unit with its share of the row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedUnit {
    pub unit: OutputUnit,
    pub flex: f64,
}

// Serialized flat, as the unit's fields plus `flex`.
impl Serialize for PlacedUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PlacedUnit", 5)?;
        state.serialize_field("id", &self.unit.id)?;
        state.serialize_field("kind", &self.unit.kind)?;
        state.serialize_field("value", &self.unit.value)?;
        state.serialize_field("width", &self.unit.width)?;
        state.serialize_field("flex", &self.flex)?;
        state.end()
    }
}

pub type Row = Vec<PlacedUnit>;

#[derive(Debug, Default)]
pub struct LayoutPacker {
    rows: Vec<Row>,
    current: Vec<OutputUnit>,
    current_width: f64,
}

impl LayoutPacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack `units` in order and return the rows.
    pub fn pack(units: impl IntoIterator<Item = OutputUnit>) -> Vec<Row> {
        let mut packer = Self::new();
        for unit in units {
            packer.add(unit);
        }
        packer.get_layout()
    }

    pub fn add(&mut self, unit: OutputUnit) {
        if unit.is_row_break() {
            self.finish();
            return;
        }

        if !self.current.is_empty() && self.current_width + unit.width > 1.0 + TOLERANCE {
            self.finish();
        }

        self.current_width += unit.width;
        self.current.push(unit);

        if self.current_width >= 1.0 - TOLERANCE {
            self.finish();
        }
    }

    /// Close the open row, if it has any units.
    pub fn finish(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let total = self.current_width;
        let row = self
            .current
            .drain(..)
            .map(|unit| {
                let flex = if total > 0.0 { unit.width / total } else { 0.0 };
                PlacedUnit { unit, flex }
            })
            .collect();
        self.rows.push(row);
        self.current_width = 0.0;
    }

    /// Close the open row and return all rows.
    pub fn get_layout(&mut self) -> Vec<Row> {
        self.finish();
        std::mem::take(&mut self.rows)
    }
}
