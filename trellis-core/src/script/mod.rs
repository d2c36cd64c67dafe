//! Script Frontend
//!
//! The language scripts are written in: a small Python-flavoured language
//! with assignments, top-level function definitions, `if`/`for`, f-strings,
//! and calls to builtins and component functions.
//!
//! - `lexer`: logos tokenizer with INDENT/DEDENT handling
//! - `ast`: statements and expressions with source spans
//! - `parser`: recursive descent parser
//! - `eval`: tree-walking evaluator behind the [`Host`] seam
//! - `builtins`: pure helpers and output components

pub mod ast;
pub mod builtins;
pub mod eval;
pub mod lexer;
pub mod parser;

use std::sync::Arc;

pub use ast::{Expr, ExprKind, FunctionDef, Module, Stmt, StmtKind};
pub use builtins::ComponentKind;
pub use eval::{Deadline, Evaluator, FunctionTable, Host, Scope};
pub use lexer::Span;
pub use parser::parse;

/// A script as loaded by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    /// Name used in unit ids and error messages.
    pub filename: Arc<str>,
    pub text: Arc<str>,
}

impl ScriptSource {
    pub fn new(filename: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
        }
    }
}
