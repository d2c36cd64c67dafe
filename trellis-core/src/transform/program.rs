//! Instrumented Program
//!
//! The transformer's output: one node declaration per top-level statement,
//! with its dependency ids and rewritten body, ready to be installed into a
//! [`Workflow`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{GraphError, NodeError};
use crate::graph::{NodeBody, NodeCx, NodeId, Workflow};
use crate::render::{OutputUnit, UnitId};
use crate::script::{Deadline, Evaluator, Expr, FunctionDef, FunctionTable, Host, Scope, Span};
use crate::value::Value;

/// What a node runs.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclBody {
    /// A rewritten top-level expression. Its dependencies are bound to
    /// `param0..paramN` in sorted id order.
    Statement(Expr),
    /// A top-level function definition. Produces no value; it exists so that
    /// callers are downstream of what the function reads.
    Function(Arc<FunctionDef>),
}

/// One node of the instrumented program.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDecl {
    pub id: NodeId,
    /// Callee name for calls, `def` for functions, `expr` otherwise.
    pub kind: String,
    pub span: Span,
    /// Variable the statement assigns, if any.
    pub binds: Option<String>,
    /// Sorted dependency ids.
    pub dependencies: SmallVec<[NodeId; 4]>,
    /// Source name passed for each dependency: the variable or function
    /// it stands for.
    pub arguments: SmallVec<[String; 4]>,
    pub body: DeclBody,
    /// Whether some dependency points at a later statement.
    pub forward: bool,
}

/// A script split into graph nodes.
#[derive(Debug, Clone)]
pub struct InstrumentedProgram {
    pub(crate) filename: Arc<str>,
    pub(crate) nodes: Vec<NodeDecl>,
    pub(crate) functions: Arc<FunctionTable>,
    /// Module-level name to the node that binds it, for names read from
    /// inside functions.
    pub(crate) globals: Arc<HashMap<String, NodeId>>,
}

impl InstrumentedProgram {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Declared node ids, in source order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|decl| decl.id.clone()).collect()
    }

    pub fn nodes(&self) -> &[NodeDecl] {
        &self.nodes
    }

    pub fn decl(&self, id: &NodeId) -> Option<&NodeDecl> {
        self.nodes.iter().find(|decl| &decl.id == id)
    }

    /// All `(dependency, dependent)` edges, in source order of the
    /// dependent.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .flat_map(|decl| {
                decl.dependencies
                    .iter()
                    .map(move |dep| (dep.clone(), decl.id.clone()))
            })
            .collect()
    }

    /// The node that binds `name` at module level.
    pub fn global(&self, name: &str) -> Option<&NodeId> {
        self.globals.get(name)
    }

    /// Register every node with `workflow`.
    pub fn install(&self, workflow: &mut Workflow, recursion_limit: usize) -> Result<(), GraphError> {
        for decl in &self.nodes {
            let body = self.node_body(decl, recursion_limit);
            workflow.register(decl.id.clone(), decl.dependencies.iter().cloned(), body)?;
        }
        Ok(())
    }

    fn node_body(&self, decl: &NodeDecl, recursion_limit: usize) -> NodeBody {
        let expr = match &decl.body {
            DeclBody::Function(_) => return Arc::new(|_| Ok(Value::Null)),
            DeclBody::Statement(expr) => expr.clone(),
        };
        let functions = Arc::clone(&self.functions);
        let globals = Arc::clone(&self.globals);
        let filename = Arc::clone(&self.filename);
        let anchor = decl.span;
        let arity = decl.dependencies.len();

        Arc::new(move |cx: &mut NodeCx<'_>| {
            let mut scope = Scope::with_locals((0..arity).map(|i| (format!("param{i}"), cx.arg(i))));
            let mut evaluator = Evaluator::new(Cow::Borrowed(&*functions), &filename, recursion_limit);
            evaluator.set_anchor(anchor);
            let mut host = NodeHost {
                cx,
                globals: &globals,
            };
            evaluator
                .eval(&expr, &mut scope, &mut host)
                .map_err(NodeError::from)
        })
    }
}

/// Host for a statement running as a graph node: module-level names are
/// read through the dependency context.
struct NodeHost<'c, 'a> {
    cx: &'c mut NodeCx<'a>,
    globals: &'c HashMap<String, NodeId>,
}

impl Host for NodeHost<'_, '_> {
    fn global(&mut self, name: &str) -> Option<Value> {
        let id = self.globals.get(name)?;
        self.cx.read(id)
    }

    fn input_state(&self, unit: &UnitId) -> Option<Value> {
        self.cx.input(unit)
    }

    fn emit(&mut self, unit: OutputUnit) {
        self.cx.emit(unit);
    }

    fn print(&mut self, line: String) {
        self.cx.print(line);
    }

    fn deadline(&self) -> Option<Deadline> {
        self.cx.deadline()
    }
}
