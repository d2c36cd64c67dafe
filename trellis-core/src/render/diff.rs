//! Render Diff Buffer
//!
//! A per-unit memo of the last value that crossed the display boundary.
//! An update is observable only if its normalized value differs from the
//! stored one; everything else is dropped before transmission.
//!
//! Values are compared in their JSON form, where NaN and infinities have
//! already become `null` (see [`Value::to_json`](crate::value::Value::to_json)).
//! Two NaNs therefore compare equal and do not re-render.

use std::collections::HashMap;

use tracing::trace;

use super::unit::UnitId;

#[derive(Debug, Clone, Default)]
pub struct RenderBuffer {
    last: HashMap<UnitId, serde_json::Value>,
}

impl RenderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` and return true if it differs from the last value seen
    /// for `id`. Returns false and leaves the buffer untouched otherwise.
    pub fn should_render(&mut self, id: &UnitId, value: serde_json::Value) -> bool {
        match self.last.get(id) {
            Some(previous) if *previous == value => {
                trace!(unit = %id, "unchanged; skipping render");
                false
            }
            _ => {
                self.last.insert(id.clone(), value);
                true
            }
        }
    }

    /// The last stored value for `id`.
    pub fn get(&self, id: &UnitId) -> Option<&serde_json::Value> {
        self.last.get(id)
    }

    /// Drop the entry for `id`, so its next value always renders.
    pub fn forget(&mut self, id: &UnitId) -> bool {
        self.last.remove(id).is_some()
    }

    /// Keep only the entries for which `keep` returns true. Returns the
    /// number of entries dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&UnitId) -> bool) -> usize {
        let before = self.last.len();
        self.last.retain(|id, _| keep(id));
        before - self.last.len()
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
