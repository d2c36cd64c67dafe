//! Outbound Messages
//!
//! What a session sends across the transport boundary, and the
//! [`Transport`] seam observers plug into.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::ScriptError;
use crate::graph::{GraphPayload, NodeId};
use crate::render::{Row, UnitId};
use crate::value::Value;

/// A message for observers of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// The packed view, with the ids of the units that changed.
    Components { rows: Vec<Row>, changed: Vec<UnitId> },
    /// Another observer changed an input.
    StateUpdate { unit_id: UnitId, value: Value },
    Error { content: ErrorPayload },
    Graph { graph: GraphPayload },
    /// One line written by `print`, tagged with the node that wrote it
    /// when the script runs incrementally.
    Output {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        node: Option<NodeId>,
    },
}

impl Outbound {
    /// MessagePack encoding for hosts.
    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    Runtime,
    Validation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
    pub kind: ErrorKind,
    pub stack_trace: Option<String>,
}

impl From<&ScriptError> for ErrorPayload {
    fn from(err: &ScriptError) -> Self {
        let kind = match err {
            ScriptError::Parse(_) => ErrorKind::Parse,
            _ if err.is_validation() => ErrorKind::Validation,
            ScriptError::Runtime(_) | ScriptError::Panicked(_) => ErrorKind::Runtime,
        };
        Self {
            message: err.to_string(),
            kind,
            stack_trace: err.stack_trace(),
        }
    }
}

/// Somewhere outbound messages can be delivered.
pub trait Transport: Send {
    /// Deliver one message. Returns false once the observer is gone.
    fn deliver(&self, message: &Outbound) -> bool;
}

impl Transport for mpsc::UnboundedSender<Outbound> {
    fn deliver(&self, message: &Outbound) -> bool {
        self.send(message.clone()).is_ok()
    }
}

/// An in-memory transport that collects messages until drained.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    messages: Arc<Mutex<Vec<Outbound>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport feeding this outbox.
    pub fn transport(&self) -> OutboxTransport {
        OutboxTransport {
            messages: Arc::clone(&self.messages),
        }
    }

    /// Take every message delivered so far.
    pub fn drain(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

pub struct OutboxTransport {
    messages: Arc<Mutex<Vec<Outbound>>>,
}

impl Transport for OutboxTransport {
    fn deliver(&self, message: &Outbound) -> bool {
        self.messages.lock().push(message.clone());
        true
    }
}
