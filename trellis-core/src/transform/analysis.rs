//! Name analysis over the AST.

use std::collections::{BTreeSet, HashSet};

use crate::script::ast::{FunctionDef, Stmt, StmtKind};
use crate::script::{Expr, ExprKind};

/// Names an expression or function body refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    /// Variables read.
    pub names: BTreeSet<String>,
    /// Functions called by name.
    pub calls: BTreeSet<String>,
}

impl References {
    fn collect(&mut self, expr: &Expr) {
        expr.walk(&mut |e| match &e.kind {
            ExprKind::Name(name) => {
                self.names.insert(name.clone());
            }
            ExprKind::Call { func, .. } => {
                self.calls.insert(func.clone());
            }
            _ => {}
        });
    }
}

/// Every variable and call target in `expr`, f-string interpolations
/// included.
pub fn expr_references(expr: &Expr) -> References {
    let mut refs = References::default();
    refs.collect(expr);
    refs
}

/// Free variables and call targets of a function body. Parameters and any
/// name assigned inside the body are local and not reported.
pub fn function_references(def: &FunctionDef) -> References {
    let mut locals: HashSet<&str> = def.params.iter().map(String::as_str).collect();
    collect_locals(&def.body, &mut locals);

    let mut refs = References::default();
    collect_block(&def.body, &mut refs);
    refs.names.retain(|name| !locals.contains(name.as_str()));
    refs
}

fn collect_locals<'a>(stmts: &'a [Stmt], locals: &mut HashSet<&'a str>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Assign { target, .. } => {
                locals.insert(target);
            }
            StmtKind::For { target, body, .. } => {
                locals.insert(target);
                collect_locals(body, locals);
            }
            StmtKind::If { branches, orelse } => {
                for (_, body) in branches {
                    collect_locals(body, locals);
                }
                collect_locals(orelse, locals);
            }
            _ => {}
        }
    }
}

fn collect_block(stmts: &[Stmt], refs: &mut References) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Assign { value, .. } => refs.collect(value),
            StmtKind::Expr(expr) | StmtKind::Return(Some(expr)) => refs.collect(expr),
            StmtKind::If { branches, orelse } => {
                for (test, body) in branches {
                    refs.collect(test);
                    collect_block(body, refs);
                }
                collect_block(orelse, refs);
            }
            StmtKind::For { iter, body, .. } => {
                refs.collect(iter);
                collect_block(body, refs);
            }
            StmtKind::Def(_) | StmtKind::Return(None) | StmtKind::Pass => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::{parse, parse_expression};

    fn names(refs: &References) -> Vec<&str> {
        refs.names.iter().map(String::as_str).collect()
    }

    #[test]
    fn finds_names_in_fstrings_and_keywords() {
        let expr = parse_expression(r#"text(f"{a} and {b:.2f}", size=c)"#).unwrap();
        let refs = expr_references(&expr);
        assert_eq!(names(&refs), vec!["a", "b", "c"]);
        assert!(refs.calls.contains("text"));
    }

    #[test]
    fn function_locals_are_not_free() {
        let module = parse(
            "def total(xs):\n    acc = 0\n    for x in xs:\n        acc = acc + x * rate\n    return round(acc)\n",
        )
        .unwrap();
        let StmtKind::Def(def) = &module.body[0].kind else {
            panic!("expected a def");
        };
        let refs = function_references(def);
        assert_eq!(names(&refs), vec!["rate"]);
        assert!(refs.calls.contains("round"));
    }
}
