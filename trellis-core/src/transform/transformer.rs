//! Source Transformer
//!
//! Splits a script into graph nodes and infers the edges between them.
//!
//! # Algorithm
//!
//! Two passes over the top-level statements:
//!
//! 1. Assign every statement a deterministic node id from its kind and
//!    position, and record which variable each statement binds and which
//!    function each `def` declares.
//! 2. Walk the statements again in order. Each variable a statement reads
//!    resolves to the latest binding *before* it; a variable that is only
//!    bound later resolves forward to its first later binding. The resolved
//!    ids, plus the nodes of any user functions called, become the
//!    statement's dependencies. The statement is rewritten so that each
//!    variable reads the positional parameter of its dependency.
//!
//! Function nodes get their edges from static call-graph analysis: the
//! functions they call and the module-level names they read.
//!
//! Finally the declared edges are checked for cycles. Any failure returns a
//! [`TransformError`] and nothing is installed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use super::analysis::{expr_references, function_references};
use super::program::{DeclBody, InstrumentedProgram, NodeDecl};
use crate::error::TransformError;
use crate::graph::NodeId;
use crate::ids;
use crate::script::{parse, Expr, ExprKind, FunctionDef, FunctionTable, Module, Span, StmtKind};

/// A top-level statement after the first pass.
enum Slot<'m> {
    Statement {
        id: NodeId,
        kind: String,
        span: Span,
        binds: Option<&'m str>,
        expr: &'m Expr,
    },
    Function {
        id: NodeId,
        span: Span,
        def: &'m Arc<FunctionDef>,
    },
}

pub struct Transformer {
    filename: Arc<str>,
}

impl Transformer {
    pub fn new(filename: impl Into<Arc<str>>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    /// Parse and transform `source`.
    pub fn transform(&self, source: &str) -> Result<InstrumentedProgram, TransformError> {
        let module = parse(source)?;
        self.transform_module(&module)
    }

    pub fn transform_module(&self, module: &Module) -> Result<InstrumentedProgram, TransformError> {
        // ---- First pass: ids and bindings ----

        let mut slots = Vec::with_capacity(module.body.len());
        let mut functions = FunctionTable::new();
        let mut function_nodes: HashMap<&str, NodeId> = HashMap::new();
        let mut bindings: HashMap<&str, Vec<(usize, NodeId)>> = HashMap::new();

        for stmt in &module.body {
            let slot = match &stmt.kind {
                StmtKind::Assign { target, value } => {
                    let id = ids::node_id(statement_kind(value), stmt.span);
                    bindings
                        .entry(target.as_str())
                        .or_default()
                        .push((slots.len(), id.clone()));
                    Slot::Statement {
                        id,
                        kind: statement_kind(value).to_string(),
                        span: stmt.span,
                        binds: Some(target.as_str()),
                        expr: value,
                    }
                }
                StmtKind::Expr(expr) => Slot::Statement {
                    id: ids::node_id(statement_kind(expr), stmt.span),
                    kind: statement_kind(expr).to_string(),
                    span: stmt.span,
                    binds: None,
                    expr,
                },
                StmtKind::Def(def) => {
                    if functions.contains_key(&def.name) {
                        return Err(TransformError::Unsupported {
                            construct: "function redefinition",
                            span: stmt.span,
                        });
                    }
                    let id = ids::node_id("def", stmt.span);
                    functions.insert(def.name.clone(), Arc::clone(def));
                    function_nodes.insert(&def.name, id.clone());
                    Slot::Function {
                        id,
                        span: stmt.span,
                        def,
                    }
                }
                StmtKind::If { .. } => {
                    return Err(TransformError::Unsupported {
                        construct: "if statement",
                        span: stmt.span,
                    })
                }
                StmtKind::For { .. } => {
                    return Err(TransformError::Unsupported {
                        construct: "for loop",
                        span: stmt.span,
                    })
                }
                StmtKind::Return(_) => {
                    return Err(TransformError::Unsupported {
                        construct: "return",
                        span: stmt.span,
                    })
                }
                StmtKind::Pass => continue,
            };
            slots.push(slot);
        }

        // ---- Function edges: call graph and globals read ----

        let mut function_deps: HashMap<&str, BTreeMap<NodeId, String>> = HashMap::new();
        for (name, def) in &functions {
            let refs = function_references(def);
            let mut deps = BTreeMap::new();
            for callee in &refs.calls {
                if let Some(id) = function_nodes.get(callee.as_str()) {
                    deps.insert(id.clone(), callee.clone());
                }
            }
            for global in &refs.names {
                match bindings.get(global.as_str()).map(Vec::as_slice) {
                    Some([(_, id)]) => {
                        deps.insert(id.clone(), global.clone());
                    }
                    Some(_) => {
                        return Err(TransformError::AmbiguousGlobal {
                            function: name.clone(),
                            name: global.clone(),
                        })
                    }
                    None => {}
                }
            }
            function_deps.insert(name.as_str(), deps);
        }

        // ---- Second pass: resolve references and rewrite ----

        let mut nodes = Vec::with_capacity(slots.len());
        for (index, slot) in slots.iter().enumerate() {
            let decl = match slot {
                Slot::Function { id, span, def } => {
                    let deps = function_deps.remove(def.name.as_str()).unwrap_or_default();
                    NodeDecl {
                        id: id.clone(),
                        kind: "def".to_string(),
                        span: *span,
                        binds: None,
                        dependencies: deps.keys().cloned().collect(),
                        arguments: deps.values().cloned().collect(),
                        body: DeclBody::Function(Arc::clone(def)),
                        forward: false,
                    }
                }
                Slot::Statement {
                    id,
                    kind,
                    span,
                    binds,
                    expr,
                } => {
                    let refs = expr_references(expr);
                    let mut deps: BTreeMap<NodeId, String> = BTreeMap::new();
                    let mut forward = false;

                    for name in &refs.names {
                        let Some(bound) = bindings.get(name.as_str()) else {
                            continue;
                        };
                        let resolved = match bound.iter().rev().find(|(at, _)| *at < index) {
                            Some((_, dep)) => dep,
                            None => {
                                let (_, dep) = &bound[0];
                                if dep != id {
                                    warn!(node = %id, name = %name, dependency = %dep, "variable is read before it is assigned; dependency points forward");
                                }
                                forward = true;
                                dep
                            }
                        };
                        deps.insert(resolved.clone(), name.clone());
                    }
                    for callee in &refs.calls {
                        if let Some(dep) = function_nodes.get(callee.as_str()) {
                            deps.insert(dep.clone(), callee.clone());
                        }
                    }

                    let renames: HashMap<String, String> = deps
                        .values()
                        .enumerate()
                        .filter(|(_, name)| !function_nodes.contains_key(name.as_str()))
                        .map(|(i, name)| (name.clone(), format!("param{i}")))
                        .collect();

                    NodeDecl {
                        id: id.clone(),
                        kind: kind.clone(),
                        span: *span,
                        binds: binds.map(str::to_string),
                        dependencies: deps.keys().cloned().collect(),
                        arguments: deps.values().cloned().collect(),
                        body: DeclBody::Statement(expr.rename(&renames)),
                        forward,
                    }
                }
            };
            nodes.push(decl);
        }

        check_acyclic(&nodes)?;

        let globals = bindings
            .into_iter()
            .filter_map(|(name, bound)| bound.last().map(|(_, id)| (name.to_string(), id.clone())))
            .collect();

        debug!(file = %self.filename, nodes = nodes.len(), "transformed script");
        Ok(InstrumentedProgram {
            filename: Arc::clone(&self.filename),
            nodes,
            functions: Arc::new(functions),
            globals: Arc::new(globals),
        })
    }
}

/// Node kind of a top-level expression: the callee for calls.
fn statement_kind(expr: &Expr) -> &str {
    match &expr.kind {
        ExprKind::Call { func, .. } => func.as_str(),
        _ => "expr",
    }
}

/// Reject any cycle among the declared edges, reporting the edge that
/// closes it.
fn check_acyclic(nodes: &[NodeDecl]) -> Result<(), TransformError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let deps: HashMap<&NodeId, &[NodeId]> = nodes
        .iter()
        .map(|decl| (&decl.id, decl.dependencies.as_slice()))
        .collect();
    let mut marks: HashMap<&NodeId, Mark> = HashMap::new();

    for decl in nodes {
        if marks.contains_key(&decl.id) {
            continue;
        }
        // Iterative DFS: (node, index of next dependency to visit)
        let mut stack: Vec<(&NodeId, usize)> = vec![(&decl.id, 0)];
        marks.insert(&decl.id, Mark::Visiting);
        while let Some((node, next)) = stack.pop() {
            let edges = deps.get(node).copied().unwrap_or_default();
            let Some(dep) = edges.get(next) else {
                marks.insert(node, Mark::Done);
                continue;
            };
            stack.push((node, next + 1));
            match marks.get(dep) {
                Some(Mark::Visiting) => {
                    return Err(TransformError::Cycle {
                        node: node.clone(),
                        dependency: dep.clone(),
                    })
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(dep, Mark::Visiting);
                    stack.push((dep, 0));
                }
            }
        }
    }
    Ok(())
}
