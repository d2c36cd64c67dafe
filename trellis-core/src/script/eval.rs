//! Tree-walking Evaluator
//!
//! The evaluator runs statements and expressions against a [`Host`]. The
//! host is the seam between the script and its surroundings. It resolves
//! module-level names, supplies input state, receives emitted units and
//! sets the deadline.
//!
//! The same evaluator serves both execution modes:
//!
//! - In incremental mode each graph node evaluates one rewritten statement;
//!   the host resolves names through the dependency context store.
//! - In full-run mode [`Evaluator::run_module`] executes the whole script;
//!   module-level assignments land in the evaluator's own globals.
//!
//! # Unit ids
//!
//! Component calls receive an id derived from the file name, the current
//! anchor statement, the call-site span and an occurrence counter. The
//! anchor and counter are reset per top-level statement in both modes, so
//! the ids agree between them.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use super::ast::*;
use super::builtins::{self, Args, ComponentKind};
use super::lexer::Span;
use crate::error::{EvalError, EvalErrorKind, TraceFrame};
use crate::ids::{self, Callsite};
use crate::render::{OutputUnit, UnitId};
use crate::value::{format_number, Value};

/// Longest string a repetition may build, in bytes.
const MAX_STR_LEN: usize = 16 * 1024 * 1024;

/// User functions visible to the evaluator, by name.
pub type FunctionTable = HashMap<String, Arc<FunctionDef>>;

/// Point in time after which evaluation fails with a timeout.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    pub at: Instant,
    /// The configured limit, reported in the error.
    pub limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }
}

/// The evaluator's view of its surroundings.
pub trait Host {
    /// Resolve a module-level name that is not a local.
    fn global(&mut self, name: &str) -> Option<Value>;

    /// Current input state of an input unit, if the session has one.
    fn input_state(&self, unit: &UnitId) -> Option<Value>;

    /// Accept a unit emitted by a component builtin.
    fn emit(&mut self, unit: OutputUnit);

    /// Accept one line written by `print`.
    fn print(&mut self, line: String);

    fn deadline(&self) -> Option<Deadline> {
        None
    }
}

/// Local variables of one activation.
#[derive(Debug, Default)]
pub struct Scope {
    locals: HashMap<String, Value>,
    /// Assignments go to the evaluator's globals instead of `locals`.
    module: bool,
}

impl Scope {
    /// The top-level scope of a full run.
    pub fn module() -> Self {
        Self {
            locals: HashMap::new(),
            module: true,
        }
    }

    pub fn with_locals(locals: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            locals: locals.into_iter().collect(),
            module: false,
        }
    }
}

enum Flow {
    Normal,
    Return(Value),
}

/// Evaluates script code. Cheap to construct; one per node execution or
/// per full run.
pub struct Evaluator<'a> {
    functions: Cow<'a, FunctionTable>,
    globals: HashMap<String, Value>,
    filename: &'a str,
    anchor: Span,
    occurrences: HashMap<Span, u32>,
    depth: usize,
    recursion_limit: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(functions: Cow<'a, FunctionTable>, filename: &'a str, recursion_limit: usize) -> Self {
        Self {
            functions,
            globals: HashMap::new(),
            filename,
            anchor: Span::default(),
            occurrences: HashMap::new(),
            depth: 0,
            recursion_limit,
        }
    }

    /// Set the top-level statement that emitted units are attributed to.
    pub fn set_anchor(&mut self, anchor: Span) {
        self.anchor = anchor;
        self.occurrences.clear();
    }

    /// Module-level variables assigned during a full run.
    pub fn globals(&self) -> &HashMap<String, Value> {
        &self.globals
    }

    /// Execute a whole script, top to bottom.
    pub fn run_module(&mut self, module: &Module, host: &mut dyn Host) -> Result<(), EvalError> {
        let mut scope = Scope::module();
        for stmt in &module.body {
            self.set_anchor(stmt.span);
            self.exec_stmt(stmt, &mut scope, host)?;
        }
        Ok(())
    }

    // ---- Statements ----

    fn exec_block(
        &mut self,
        stmts: &[Stmt],
        scope: &mut Scope,
        host: &mut dyn Host,
    ) -> Result<Flow, EvalError> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec_stmt(stmt, scope, host)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(
        &mut self,
        stmt: &Stmt,
        scope: &mut Scope,
        host: &mut dyn Host,
    ) -> Result<Flow, EvalError> {
        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                let value = self.eval(value, scope, host)?;
                self.assign(scope, target, value);
            }
            StmtKind::Expr(expr) => {
                self.eval(expr, scope, host)?;
            }
            StmtKind::Def(def) => {
                self.functions
                    .to_mut()
                    .insert(def.name.clone(), Arc::clone(def));
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, scope, host)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If { branches, orelse } => {
                for (test, body) in branches {
                    if self.eval(test, scope, host)?.is_truthy() {
                        return self.exec_block(body, scope, host);
                    }
                }
                return self.exec_block(orelse, scope, host);
            }
            StmtKind::For { target, iter, body } => {
                let iterable = self.eval(iter, scope, host)?;
                let items = iterate(&iterable).map_err(|kind| EvalError::new(kind, iter.span))?;
                for item in items {
                    self.check_deadline(host, stmt.span)?;
                    self.assign(scope, target, item);
                    if let Flow::Return(value) = self.exec_block(body, scope, host)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            StmtKind::Pass => {}
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, scope: &mut Scope, name: &str, value: Value) {
        if scope.module {
            self.globals.insert(name.to_string(), value);
        } else {
            scope.locals.insert(name.to_string(), value);
        }
    }

    fn lookup(
        &mut self,
        name: &str,
        scope: &Scope,
        host: &mut dyn Host,
        span: Span,
    ) -> Result<Value, EvalError> {
        if let Some(value) = scope.locals.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        host.global(name)
            .ok_or_else(|| EvalError::new(EvalErrorKind::Name(name.to_string()), span))
    }

    fn check_deadline(&self, host: &dyn Host, span: Span) -> Result<(), EvalError> {
        match host.deadline() {
            Some(deadline) if Instant::now() >= deadline.at => Err(EvalError::new(
                EvalErrorKind::Timeout(deadline.limit),
                span,
            )),
            _ => Ok(()),
        }
    }

    // ---- Expressions ----

    /// Evaluate one expression.
    pub fn eval(
        &mut self,
        expr: &Expr,
        scope: &mut Scope,
        host: &mut dyn Host,
    ) -> Result<Value, EvalError> {
        let at = |kind: EvalErrorKind| EvalError::new(kind, expr.span);
        match &expr.kind {
            ExprKind::Literal(value) => Ok(value.clone()),
            ExprKind::Name(name) => self.lookup(name, scope, host, expr.span),
            ExprKind::FString(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        FPart::Literal(text) => out.push_str(text),
                        FPart::Expr { expr, precision } => {
                            let value = self.eval(expr, scope, host)?;
                            match (precision, value.as_f64()) {
                                (Some(p), Some(n)) if !matches!(value, Value::Bool(_)) => {
                                    out.push_str(&format!("{:.*}", *p, n))
                                }
                                _ => out.push_str(&value.to_string()),
                            }
                        }
                    }
                }
                Ok(Value::from(out))
            }
            ExprKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope, host)?);
                }
                Ok(Value::list(values))
            }
            ExprKind::Dict(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = match self.eval(key, scope, host)? {
                        Value::Str(s) => s.to_string(),
                        Value::Number(n) => format_number(n),
                        other => {
                            return Err(at(EvalErrorKind::type_error(format!(
                                "dict keys must be str or number, not {}",
                                other.type_name()
                            ))))
                        }
                    };
                    let value = self.eval(value, scope, host)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, scope, host)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        Value::Bool(b) => Ok(Value::Number(if b { -1.0 } else { 0.0 })),
                        other => Err(at(EvalErrorKind::type_error(format!(
                            "bad operand type for unary -: '{}'",
                            other.type_name()
                        )))),
                    },
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, scope, host)?;
                let right = self.eval(right, scope, host)?;
                binary(*op, &left, &right).map_err(at)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval(left, scope, host)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right, scope, host),
                }
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let mut evaluated = Args::default();
                for arg in args {
                    evaluated.positional.push(self.eval(arg, scope, host)?);
                }
                for keyword in keywords {
                    let value = self.eval(&keyword.value, scope, host)?;
                    evaluated.keywords.insert(keyword.name.clone(), value);
                }
                self.call(func, evaluated, expr.span, host)
            }
            ExprKind::Index { value, index } => {
                let value = self.eval(value, scope, host)?;
                let index = self.eval(index, scope, host)?;
                subscript(&value, &index).map_err(at)
            }
            ExprKind::Attribute { value, attr } => {
                let value = self.eval(value, scope, host)?;
                match &value {
                    Value::Map(entries) => entries.get(attr).cloned().ok_or_else(|| {
                        at(EvalErrorKind::validation(
                            format!("unknown field '{}'", attr),
                            entries.keys().cloned().collect(),
                        ))
                    }),
                    other => Err(at(EvalErrorKind::type_error(format!(
                        "'{}' object has no attribute '{}'",
                        other.type_name(),
                        attr
                    )))),
                }
            }
        }
    }

    fn call(
        &mut self,
        name: &str,
        args: Args,
        span: Span,
        host: &mut dyn Host,
    ) -> Result<Value, EvalError> {
        self.check_deadline(host, span)?;

        if let Some(def) = self.functions.get(name).cloned() {
            return self.call_user(&def, args, span, host);
        }

        if let Some(kind) = ComponentKind::from_name(name) {
            let id = self.next_unit_id(kind, span);
            return builtins::call_component(kind, id, args, host)
                .map_err(|kind| EvalError::new(kind, span));
        }

        if name == "print" {
            let line = builtins::print_line(args).map_err(|kind| EvalError::new(kind, span))?;
            host.print(line);
            return Ok(Value::Null);
        }

        match builtins::call_pure(name, args) {
            Some(result) => result.map_err(|kind| EvalError::new(kind, span)),
            None => Err(EvalError::new(EvalErrorKind::Name(name.to_string()), span)),
        }
    }

    fn next_unit_id(&mut self, kind: ComponentKind, call: Span) -> UnitId {
        let counter = self.occurrences.entry(call).or_insert(0);
        let occurrence = *counter;
        *counter += 1;
        ids::unit_id(
            kind.name(),
            &Callsite {
                filename: self.filename,
                anchor: self.anchor,
                call,
                occurrence,
            },
        )
    }

    fn call_user(
        &mut self,
        def: &FunctionDef,
        args: Args,
        span: Span,
        host: &mut dyn Host,
    ) -> Result<Value, EvalError> {
        if self.depth >= self.recursion_limit {
            return Err(EvalError::new(
                EvalErrorKind::Recursion(self.recursion_limit),
                span,
            ));
        }

        let locals = bind_params(def, args).map_err(|kind| EvalError::new(kind, span))?;
        let mut scope = Scope::with_locals(locals);

        self.depth += 1;
        let result = self.exec_block(&def.body, &mut scope, host);
        self.depth -= 1;

        match result {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(Flow::Normal) => Ok(Value::Null),
            Err(mut err) => {
                err.trace.push(TraceFrame {
                    function: def.name.clone(),
                    span,
                });
                Err(err)
            }
        }
    }
}

fn bind_params(def: &FunctionDef, args: Args) -> Result<Vec<(String, Value)>, EvalErrorKind> {
    if args.positional.len() > def.params.len() {
        return Err(EvalErrorKind::type_error(format!(
            "{}() takes {} positional arguments but {} were given",
            def.name,
            def.params.len(),
            args.positional.len()
        )));
    }
    let mut slots: Vec<Option<Value>> = vec![None; def.params.len()];
    for (slot, value) in slots.iter_mut().zip(args.positional) {
        *slot = Some(value);
    }
    for (name, value) in args.keywords {
        let Some(index) = def.params.iter().position(|p| *p == name) else {
            return Err(EvalErrorKind::validation(
                format!("{}() got an unexpected keyword argument '{}'", def.name, name),
                def.params.clone(),
            ));
        };
        if slots[index].is_some() {
            return Err(EvalErrorKind::type_error(format!(
                "{}() got multiple values for argument '{}'",
                def.name, name
            )));
        }
        slots[index] = Some(value);
    }
    def.params
        .iter()
        .zip(slots)
        .map(|(param, slot)| {
            slot.map(|value| (param.clone(), value)).ok_or_else(|| {
                EvalErrorKind::type_error(format!(
                    "{}() missing required argument: '{}'",
                    def.name, param
                ))
            })
        })
        .collect()
}

/// Order two values the way `<` does. `None` when they are not comparable.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                match compare_values(l, r)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalErrorKind> {
    let unsupported = || {
        EvalErrorKind::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op,
            left.type_name(),
            right.type_name()
        ))
    };

    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => return Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare_values(left, right).ok_or_else(|| {
                EvalErrorKind::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op,
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::from(format!("{}{}", a, b))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::list(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinaryOp::Mul, Value::Str(s), n) | (BinaryOp::Mul, n, Value::Str(s))
            if n.as_f64().is_some() =>
        {
            let times = n.as_f64().unwrap_or(0.0).max(0.0).floor();
            let len = times * s.len() as f64;
            if len > MAX_STR_LEN as f64 {
                return Err(EvalErrorKind::Overflow(format!(
                    "repeated string of {} bytes exceeds the limit of {}",
                    len, MAX_STR_LEN
                )));
            }
            Ok(Value::from(s.repeat(times as usize)))
        }
        _ => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(unsupported());
            };
            let n = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err(EvalErrorKind::ZeroDivision);
                    }
                    a / b
                }
                BinaryOp::Mod => {
                    if b == 0.0 {
                        return Err(EvalErrorKind::ZeroDivision);
                    }
                    a - b * (a / b).floor()
                }
                _ => return Err(unsupported()),
            };
            Ok(Value::Number(n))
        }
    }
}

fn subscript(value: &Value, index: &Value) -> Result<Value, EvalErrorKind> {
    match value {
        Value::List(items) => {
            let i = list_index(index, items.len())?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = list_index(index, chars.len())?;
            Ok(Value::from(chars[i].to_string()))
        }
        Value::Map(entries) => {
            let key = match index {
                Value::Str(s) => s.to_string(),
                Value::Number(n) => format_number(*n),
                other => return Err(EvalErrorKind::Key(other.repr())),
            };
            entries
                .get(&key)
                .cloned()
                .ok_or_else(|| EvalErrorKind::Key(index.repr()))
        }
        other => Err(EvalErrorKind::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn list_index(index: &Value, len: usize) -> Result<usize, EvalErrorKind> {
    let Some(raw) = index.as_f64().filter(|n| n.fract() == 0.0) else {
        return Err(EvalErrorKind::type_error(format!(
            "indices must be integers, not {}",
            index.type_name()
        )));
    };
    let resolved = if raw < 0.0 { raw + len as f64 } else { raw };
    if resolved < 0.0 || resolved >= len as f64 {
        return Err(EvalErrorKind::Index("index out of range".into()));
    }
    Ok(resolved as usize)
}

fn iterate(value: &Value) -> Result<Vec<Value>, EvalErrorKind> {
    match value {
        Value::List(items) => Ok(items.to_vec()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
        Value::Map(entries) => Ok(entries.keys().map(|k| Value::from(k.as_str())).collect()),
        other => Err(EvalErrorKind::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}
