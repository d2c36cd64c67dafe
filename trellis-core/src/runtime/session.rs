//! Per-session state.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::view::ViewState;
use crate::render::{InputTable, RenderBuffer};

/// Identifies one client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Everything a session owns besides its graph.
#[derive(Debug, Default)]
pub struct SessionContext {
    /// Current values of input units.
    pub inputs: InputTable,
    /// Last accepted value of each input, to drop no-op changes.
    pub input_buffer: RenderBuffer,
    /// Last transmitted form of each output unit.
    pub unit_buffer: RenderBuffer,
    pub view: ViewState,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything rendered so the next run transmits the whole tree.
    /// Input state is kept.
    pub fn reset_render(&mut self) {
        self.unit_buffer.clear();
        self.view.clear();
    }
}
