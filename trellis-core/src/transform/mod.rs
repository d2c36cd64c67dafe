//! Source Transformation
//!
//! Static analysis and rewrite of a script into graph-node registrations.
//!
//! - `analysis`: free-variable and call-target collection
//! - `transformer`: the two-pass dependency inference
//! - `program`: the instrumented program and its installation into a
//!   [`Workflow`](crate::graph::Workflow)
//! - `printer`: pseudo-source rendering for debugging

mod analysis;
mod printer;
mod program;
mod transformer;

pub use analysis::{expr_references, function_references, References};
pub use program::{DeclBody, InstrumentedProgram, NodeDecl};
pub use transformer::Transformer;
