//! Script AST
//!
//! Statements and expressions produced by the parser. Every node carries the
//! [`Span`] of its first token; spans feed error messages, unit ids, and
//! node ids.
//!
//! `Display` renders nodes back to source form. The output is not
//! byte-identical to the input (binary operations are parenthesized), but
//! it parses to an equivalent tree.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::lexer::Span;
use crate::value::Value;

/// A parsed script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Assign {
        target: String,
        value: Expr,
    },
    Expr(Expr),
    Def(Arc<FunctionDef>),
    Return(Option<Expr>),
    If {
        /// `if` and `elif` arms, in order.
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    For {
        target: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Pass,
}

/// A top-level function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Name(String),
    FString(Vec<FPart>),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Calls are by name only.
    Call {
        func: String,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Index {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub name: String,
    pub value: Expr,
}

/// A piece of an f-string.
#[derive(Debug, Clone, PartialEq)]
pub enum FPart {
    Literal(String),
    Expr {
        expr: Expr,
        /// Digits after the point for a `:.Nf` format spec.
        precision: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Visit this expression and every sub-expression, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Name(_) => {}
            ExprKind::FString(parts) => {
                for part in parts {
                    if let FPart::Expr { expr, .. } = part {
                        expr.walk(visit);
                    }
                }
            }
            ExprKind::List(items) => items.iter().for_each(|e| e.walk(visit)),
            ExprKind::Dict(entries) => {
                for (k, v) in entries {
                    k.walk(visit);
                    v.walk(visit);
                }
            }
            ExprKind::Unary { operand, .. } => operand.walk(visit),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            ExprKind::Call { args, keywords, .. } => {
                args.iter().for_each(|e| e.walk(visit));
                keywords.iter().for_each(|k| k.value.walk(visit));
            }
            ExprKind::Index { value, index } => {
                value.walk(visit);
                index.walk(visit);
            }
            ExprKind::Attribute { value, .. } => value.walk(visit),
        }
    }

    /// Copy of this expression with variable references renamed. Call
    /// targets are left alone.
    pub fn rename(&self, names: &HashMap<String, String>) -> Expr {
        let r = |e: &Expr| Box::new(e.rename(names));
        let kind = match &self.kind {
            ExprKind::Name(name) => match names.get(name) {
                Some(renamed) => ExprKind::Name(renamed.clone()),
                None => ExprKind::Name(name.clone()),
            },
            ExprKind::Literal(v) => ExprKind::Literal(v.clone()),
            ExprKind::FString(parts) => ExprKind::FString(
                parts
                    .iter()
                    .map(|part| match part {
                        FPart::Literal(s) => FPart::Literal(s.clone()),
                        FPart::Expr { expr, precision } => FPart::Expr {
                            expr: expr.rename(names),
                            precision: *precision,
                        },
                    })
                    .collect(),
            ),
            ExprKind::List(items) => ExprKind::List(items.iter().map(|e| e.rename(names)).collect()),
            ExprKind::Dict(entries) => ExprKind::Dict(
                entries
                    .iter()
                    .map(|(k, v)| (k.rename(names), v.rename(names)))
                    .collect(),
            ),
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: r(operand),
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op: *op,
                left: r(left),
                right: r(right),
            },
            ExprKind::Logical { op, left, right } => ExprKind::Logical {
                op: *op,
                left: r(left),
                right: r(right),
            },
            ExprKind::Call {
                func,
                args,
                keywords,
            } => ExprKind::Call {
                func: func.clone(),
                args: args.iter().map(|e| e.rename(names)).collect(),
                keywords: keywords
                    .iter()
                    .map(|k| Keyword {
                        name: k.name.clone(),
                        value: k.value.rename(names),
                    })
                    .collect(),
            },
            ExprKind::Index { value, index } => ExprKind::Index {
                value: r(value),
                index: r(index),
            },
            ExprKind::Attribute { value, attr } => ExprKind::Attribute {
                value: r(value),
                attr: attr.clone(),
            },
        };
        Expr::new(kind, self.span)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "not "),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        write!(f, "{}", op)
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "and"),
            LogicalOp::Or => write!(f, "or"),
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Str(s) => write!(f, "{:?}", &**s),
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(value) => write_literal(f, value),
            ExprKind::Name(name) => write!(f, "{}", name),
            ExprKind::FString(parts) => {
                write!(f, "f\"")?;
                for part in parts {
                    match part {
                        FPart::Literal(s) => {
                            let escaped = s
                                .replace('\\', "\\\\")
                                .replace('"', "\\\"")
                                .replace('\n', "\\n")
                                .replace('{', "{{")
                                .replace('}', "}}");
                            write!(f, "{}", escaped)?;
                        }
                        FPart::Expr { expr, precision } => match precision {
                            Some(p) => write!(f, "{{{}:.{}f}}", expr, p)?,
                            None => write!(f, "{{{}}}", expr)?,
                        },
                    }
                }
                write!(f, "\"")
            }
            ExprKind::List(items) => {
                write!(f, "[")?;
                write_separated(f, items)?;
                write!(f, "]")
            }
            ExprKind::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            ExprKind::Unary { op, operand } => write!(f, "({}{})", op, operand),
            ExprKind::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            ExprKind::Logical { op, left, right } => write!(f, "({} {} {})", left, op, right),
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                write!(f, "{}(", func)?;
                write_separated(f, args)?;
                for (i, keyword) in keywords.iter().enumerate() {
                    if i > 0 || !args.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", keyword.name, keyword.value)?;
                }
                write!(f, ")")
            }
            ExprKind::Index { value, index } => write!(f, "{}[{}]", value, index),
            ExprKind::Attribute { value, attr } => write!(f, "{}.{}", value, attr),
        }
    }
}

fn write_separated(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Write `stmts` as an indented block.
pub(crate) fn write_block(f: &mut fmt::Formatter<'_>, stmts: &[Stmt], depth: usize) -> fmt::Result {
    let pad = "    ".repeat(depth);
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Assign { target, value } => writeln!(f, "{}{} = {}", pad, target, value)?,
            StmtKind::Expr(expr) => writeln!(f, "{}{}", pad, expr)?,
            StmtKind::Def(def) => {
                writeln!(f, "{}def {}({}):", pad, def.name, def.params.join(", "))?;
                write_block(f, &def.body, depth + 1)?;
            }
            StmtKind::Return(Some(expr)) => writeln!(f, "{}return {}", pad, expr)?,
            StmtKind::Return(None) => writeln!(f, "{}return", pad)?,
            StmtKind::If { branches, orelse } => {
                for (i, (test, body)) in branches.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    writeln!(f, "{}{} {}:", pad, keyword, test)?;
                    write_block(f, body, depth + 1)?;
                }
                if !orelse.is_empty() {
                    writeln!(f, "{}else:", pad)?;
                    write_block(f, orelse, depth + 1)?;
                }
            }
            StmtKind::For { target, iter, body } => {
                writeln!(f, "{}for {} in {}:", pad, target, iter)?;
                write_block(f, body, depth + 1)?;
            }
            StmtKind::Pass => writeln!(f, "{}pass", pad)?,
        }
    }
    Ok(())
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(f, &self.body, 0)
    }
}
