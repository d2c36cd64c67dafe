//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive script
//! engine. It turns a linear dashboard script into an incrementally
//! recomputed dependency graph:
//!
//! - A script frontend (lexer, parser, evaluator, builtins)
//! - A source transformer that infers dependencies between statements
//! - A DAG workflow engine that re-executes only the affected subgraph
//! - A render diff buffer and a row layout packer
//! - A per-session run orchestrator with a tokio session actor
//!
//! The crate is designed to be used both as a native Rust library and, with
//! the `python` feature, as a Python extension module via PyO3.
//!
//! # Architecture
//!
//! - `script`: Lexing, parsing and evaluation of the script language
//! - `transform`: Static analysis and rewrite into graph-node registrations
//! - `graph`: Nodes, the context store, and the workflow engine
//! - `render`: Output units, render diffing, and layout packing
//! - `runtime`: The run orchestrator, sessions, and outbound messages
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::runtime::{Outbox, ScriptRunner, SessionId};
//! use trellis_core::script::ScriptSource;
//! use trellis_core::EngineConfig;
//!
//! let mut runner = ScriptRunner::new(SessionId::from("client-1"), EngineConfig::default());
//! let outbox = Outbox::new();
//! runner.attach(outbox.transport());
//!
//! runner.start(ScriptSource::new("app.tr", r#"
//! n = slider("Count", min=0, max=10, default=5)
//! text(f"Double is {n * 2}")
//! "#))?;
//!
//! // Only the slider node and the text node that reads it are recomputed.
//! let slider_id = runner.layout()[0][0].unit.id.clone();
//! runner.rerun([(slider_id, 7.into())].into_iter().collect())?;
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod ids;
pub mod render;
pub mod runtime;
pub mod script;
pub mod transform;
pub mod value;

#[cfg(feature = "python")]
mod python;

pub use config::{EngineConfig, RetryPolicy};
pub use error::{
    EvalError, EvalErrorKind, GraphError, NodeError, ParseError, RunnerError, ScriptError,
    TransformError,
};
pub use value::Value;
