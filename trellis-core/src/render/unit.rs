//! Output Units
//!
//! An output unit is one piece of visible output: a block of text, a slider,
//! a table. Each unit is produced by exactly one graph node per run and is
//! identified by a [`UnitId`] that stays the same across reruns of the same
//! source.

use std::borrow::Borrow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Kind of the unit that closes the current layout row without being
/// placed.
pub const ROW_BREAK_KIND: &str = "separator";

/// Stable identifier of an output unit, e.g. `slider-3fa2c01b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for UnitId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UnitId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Current values of a session's input units.
pub type InputTable = IndexMap<UnitId, Value>;

/// One emitted piece of output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputUnit {
    pub id: UnitId,
    /// Semantic kind, e.g. `text` or `slider`.
    pub kind: String,
    /// Kind-specific payload.
    pub value: Value,
    /// Declared relative width in (0, 1].
    pub width: f64,
}

impl OutputUnit {
    pub fn new(id: UnitId, kind: impl Into<String>, value: Value, width: f64) -> Self {
        Self {
            id,
            kind: kind.into(),
            value,
            width,
        }
    }

    /// Whether this unit closes the current layout row.
    pub fn is_row_break(&self) -> bool {
        self.kind == ROW_BREAK_KIND
    }

    /// The normalized form compared by the render diff buffer. Kind and
    /// width are part of it, so a unit that only changed width re-renders.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind,
            "value": self.value.to_json(),
            "width": self.width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_is_row_break() {
        let unit = OutputUnit::new(UnitId::from("separator-1"), "separator", Value::Null, 1.0);
        assert!(unit.is_row_break());

        let text = OutputUnit::new(UnitId::from("text-1"), "text", Value::from("hi"), 1.0);
        assert!(!text.is_row_break());
    }

    #[test]
    fn snapshot_normalizes_nan() {
        let unit = OutputUnit::new(
            UnitId::from("text-1"),
            "text",
            Value::Number(f64::NAN),
            0.5,
        );
        assert_eq!(unit.snapshot()["value"], serde_json::Value::Null);
    }

    #[test]
    fn unit_id_serializes_as_plain_string() {
        let id = UnitId::from("slider-0a1b2c3d");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"slider-0a1b2c3d\"");
    }
}
