//! Error Types
//!
//! Every failure the engine can report, grouped by the layer that raises it:
//!
//! - [`ParseError`]: the script could not be lexed or parsed
//! - [`EvalError`]: a script raised while being evaluated
//! - [`TransformError`]: the source could not be split into graph nodes;
//!   recovered by switching the session to full-run mode
//! - [`GraphError`]: a registration would break the graph's shape
//! - [`NodeError`]: a single node failed; recorded on the node
//! - [`ScriptError`]: a full-run failure surfaced to observers
//! - [`RunnerError`]: a session operation was refused

use std::time::Duration;

use thiserror::Error;

use crate::graph::NodeId;
use crate::runtime::RunState;
use crate::script::Span;

/// The script could not be lexed or parsed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {span}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// What went wrong while evaluating a script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalErrorKind {
    #[error("NameError: name '{0}' is not defined")]
    Name(String),

    #[error("TypeError: {0}")]
    Type(String),

    /// Bad arguments to a builtin. `alternatives` lists what would have
    /// been accepted.
    #[error("ValidationError: {message}{}", alternatives_hint(.alternatives))]
    Validation {
        message: String,
        alternatives: Vec<String>,
    },

    #[error("IndexError: {0}")]
    Index(String),

    #[error("KeyError: {0}")]
    Key(String),

    #[error("ZeroDivisionError: division by zero")]
    ZeroDivision,

    /// A result would exceed a size limit.
    #[error("OverflowError: {0}")]
    Overflow(String),

    #[error("RecursionError: maximum recursion depth of {0} exceeded")]
    Recursion(usize),

    #[error("TimeoutError: node exceeded its deadline of {0:?}")]
    Timeout(Duration),
}

fn alternatives_hint(alternatives: &[String]) -> String {
    if alternatives.is_empty() {
        String::new()
    } else {
        format!(" (expected one of: {})", alternatives.join(", "))
    }
}

impl EvalErrorKind {
    pub fn type_error(message: impl Into<String>) -> Self {
        EvalErrorKind::Type(message.into())
    }

    pub fn validation(message: impl Into<String>, alternatives: Vec<String>) -> Self {
        EvalErrorKind::Validation {
            message: message.into(),
            alternatives,
        }
    }
}

/// One frame of the call trace attached to an [`EvalError`].
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub function: String,
    pub span: Span,
}

/// A script raised during evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {span}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub span: Span,
    /// Innermost call first.
    pub trace: Vec<TraceFrame>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, span: Span) -> Self {
        Self {
            kind,
            span,
            trace: Vec::new(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, EvalErrorKind::Validation { .. })
    }

    /// Render the call trace outermost call first, like a Python traceback.
    pub fn stack_trace(&self) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        for frame in self.trace.iter().rev() {
            out.push_str(&format!("  {}, in {}\n", frame.span, frame.function));
        }
        out.push_str(&format!("  {}\n{}", self.span, self.kind));
        out
    }
}

/// The source could not be split into graph nodes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("failed to parse script: {0}")]
    Parse(#[from] ParseError),

    #[error("dependency cycle: {node} depends on {dependency}")]
    Cycle { node: NodeId, dependency: NodeId },

    #[error("top-level {construct} at {span} cannot be split into graph nodes")]
    Unsupported { construct: &'static str, span: Span },

    #[error("function '{function}' reads global '{name}', which is assigned more than once")]
    AmbiguousGlobal { function: String, name: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// A registration was refused by the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("adding {node} -> {dependency} would close a dependency cycle")]
    Cycle { node: NodeId, dependency: NodeId },

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
}

/// A single node failed. Recorded on the node and visible through
/// introspection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
    #[error(transparent)]
    Eval(EvalError),

    #[error("upstream node {0} failed")]
    UpstreamFailed(NodeId),

    #[error("node exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("node body panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Custom(String),
}

impl NodeError {
    pub fn custom(message: impl Into<String>) -> Self {
        NodeError::Custom(message.into())
    }

    /// Stack trace for error payloads, when the failure came from a script.
    pub fn stack_trace(&self) -> Option<String> {
        match self {
            NodeError::Eval(err) => Some(err.stack_trace()),
            _ => None,
        }
    }
}

impl From<EvalError> for NodeError {
    fn from(err: EvalError) -> Self {
        match err.kind {
            EvalErrorKind::Timeout(limit) => NodeError::Timeout(limit),
            _ => NodeError::Eval(err),
        }
    }
}

/// A full-run failure. Moves the session to the error state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("failed to parse script: {0}")]
    Parse(#[from] ParseError),

    #[error("error executing script: {0}")]
    Runtime(#[from] EvalError),

    #[error("script execution panicked: {0}")]
    Panicked(String),
}

impl ScriptError {
    pub fn stack_trace(&self) -> Option<String> {
        match self {
            ScriptError::Parse(_) | ScriptError::Panicked(_) => None,
            ScriptError::Runtime(err) => Some(err.stack_trace()),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ScriptError::Runtime(err) if err.is_validation())
    }
}

/// A session operation was refused or failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunnerError {
    #[error("session is not running (state: {0})")]
    NotRunning(RunState),

    #[error("session has already been started")]
    AlreadyStarted,

    #[error("no script has been loaded")]
    NoScript,

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("session task has shut down")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_lists_alternatives() {
        let kind = EvalErrorKind::validation(
            "unknown argument 'colour' for slider()",
            vec!["label".into(), "min".into(), "max".into()],
        );
        assert_eq!(
            kind.to_string(),
            "ValidationError: unknown argument 'colour' for slider() (expected one of: label, min, max)"
        );
    }

    #[test]
    fn eval_timeout_becomes_node_timeout() {
        let err = EvalError::new(
            EvalErrorKind::Timeout(Duration::from_millis(5)),
            Span::new(1, 1),
        );
        assert_eq!(
            NodeError::from(err),
            NodeError::Timeout(Duration::from_millis(5))
        );
    }

    #[test]
    fn stack_trace_lists_outermost_call_first() {
        let mut err = EvalError::new(EvalErrorKind::ZeroDivision, Span::new(3, 12));
        err.trace.push(TraceFrame {
            function: "inner".into(),
            span: Span::new(6, 12),
        });
        err.trace.push(TraceFrame {
            function: "outer".into(),
            span: Span::new(8, 1),
        });

        let trace = err.stack_trace();
        let outer = trace.find("outer").unwrap();
        let inner = trace.find("inner").unwrap();
        assert!(outer < inner);
        assert!(trace.ends_with("ZeroDivisionError: division by zero"));
    }
}
