//! Built-in Functions
//!
//! Two families of functions are always in scope:
//!
//! - Pure helpers (`len`, `str`, `range`, ...) that compute a value.
//! - Components (`text`, `slider`, ...) that build an [`OutputUnit`], emit it
//!   through the [`Host`], and return the unit's value. Input components
//!   return the session's current input state when there is one, and their
//!   default otherwise.
//!
//! Bad arguments raise `ValidationError` listing what would have been
//! accepted.

use std::cmp::Ordering;

use indexmap::IndexMap;

use super::eval::{compare_values, Host};
use crate::error::EvalErrorKind;
use crate::render::{OutputUnit, UnitId};
use crate::value::Value;

/// Upper bound on the length of a `range()` result.
const MAX_RANGE_LEN: usize = 1_000_000;

/// Evaluated call arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: IndexMap<String, Value>,
}

/// Output components available to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Text,
    Alert,
    Button,
    Checkbox,
    Slider,
    Selectbox,
    TextInput,
    Table,
    Progress,
    Separator,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 10] = [
        ComponentKind::Text,
        ComponentKind::Alert,
        ComponentKind::Button,
        ComponentKind::Checkbox,
        ComponentKind::Slider,
        ComponentKind::Selectbox,
        ComponentKind::TextInput,
        ComponentKind::Table,
        ComponentKind::Progress,
        ComponentKind::Separator,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Text => "text",
            ComponentKind::Alert => "alert",
            ComponentKind::Button => "button",
            ComponentKind::Checkbox => "checkbox",
            ComponentKind::Slider => "slider",
            ComponentKind::Selectbox => "selectbox",
            ComponentKind::TextInput => "text_input",
            ComponentKind::Table => "table",
            ComponentKind::Progress => "progress",
            ComponentKind::Separator => "separator",
        }
    }

    /// Accepted parameters, in positional order.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            ComponentKind::Text => &["markdown", "size"],
            ComponentKind::Alert => &["message", "level", "size"],
            ComponentKind::Button => &["label", "size"],
            ComponentKind::Checkbox => &["label", "default", "size"],
            ComponentKind::Slider => &["label", "min", "max", "default", "step", "size"],
            ComponentKind::Selectbox => &["label", "options", "default", "size"],
            ComponentKind::TextInput => &["label", "default", "placeholder", "size"],
            ComponentKind::Table => &["data", "title", "size"],
            ComponentKind::Progress => &["label", "value", "size"],
            ComponentKind::Separator => &[],
        }
    }

    /// Whether the unit's value is driven by user input.
    pub fn is_input(self) -> bool {
        matches!(
            self,
            ComponentKind::Button
                | ComponentKind::Checkbox
                | ComponentKind::Slider
                | ComponentKind::Selectbox
                | ComponentKind::TextInput
        )
    }
}

const PURE: &[&str] = &[
    "len", "str", "int", "float", "round", "abs", "min", "max", "sum", "range", "sorted", "upper",
    "lower",
];

/// Whether `name` resolves to a builtin when no user function shadows it.
pub fn is_builtin(name: &str) -> bool {
    PURE.contains(&name) || name == "print" || ComponentKind::from_name(name).is_some()
}

// ---- Argument binding ----

struct Bound {
    func: &'static str,
    params: &'static [&'static str],
    slots: Vec<Option<Value>>,
}

fn bind(
    func: &'static str,
    params: &'static [&'static str],
    args: Args,
) -> Result<Bound, EvalErrorKind> {
    if args.positional.len() > params.len() {
        return Err(EvalErrorKind::type_error(format!(
            "{}() takes at most {} arguments ({} given)",
            func,
            params.len(),
            args.positional.len()
        )));
    }
    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (slot, value) in slots.iter_mut().zip(args.positional) {
        *slot = Some(value);
    }
    for (name, value) in args.keywords {
        let Some(index) = params.iter().position(|p| *p == name) else {
            return Err(EvalErrorKind::validation(
                format!("unknown argument '{}' for {}()", name, func),
                params.iter().map(|p| p.to_string()).collect(),
            ));
        };
        if slots[index].is_some() {
            return Err(EvalErrorKind::type_error(format!(
                "{}() got multiple values for argument '{}'",
                func, name
            )));
        }
        slots[index] = Some(value);
    }
    Ok(Bound {
        func,
        params,
        slots,
    })
}

impl Bound {
    fn index(&self, name: &str) -> usize {
        self.params
            .iter()
            .position(|p| *p == name)
            .unwrap_or(usize::MAX)
    }

    /// Take an argument; an explicit `None` counts as absent.
    fn optional(&mut self, name: &str) -> Option<Value> {
        let index = self.index(name);
        self.slots
            .get_mut(index)
            .and_then(Option::take)
            .filter(|v| !v.is_null())
    }

    fn required(&mut self, name: &str) -> Result<Value, EvalErrorKind> {
        let index = self.index(name);
        self.slots.get_mut(index).and_then(Option::take).ok_or_else(|| {
            EvalErrorKind::type_error(format!(
                "{}() missing required argument: '{}'",
                self.func, name
            ))
        })
    }

    fn number(&mut self, name: &str, default: f64) -> Result<f64, EvalErrorKind> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => expect_number(self.func, name, &value),
        }
    }

    /// The declared width; must lie in (0, 1].
    fn width(&mut self) -> Result<f64, EvalErrorKind> {
        let size = self.number("size", 1.0)?;
        if size > 0.0 && size <= 1.0 {
            Ok(size)
        } else {
            Err(EvalErrorKind::validation(
                format!("{}() size must be in (0, 1], got {}", self.func, Value::Number(size)),
                Vec::new(),
            ))
        }
    }
}

fn expect_number(func: &str, name: &str, value: &Value) -> Result<f64, EvalErrorKind> {
    value.as_f64().ok_or_else(|| {
        EvalErrorKind::type_error(format!(
            "{}() argument '{}' must be a number, not {}",
            func,
            name,
            value.type_name()
        ))
    })
}

fn payload<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

// ---- Components ----

/// Run a component builtin. The caller supplies the unit's stable id.
pub(crate) fn call_component(
    kind: ComponentKind,
    id: UnitId,
    args: Args,
    host: &mut dyn Host,
) -> Result<Value, EvalErrorKind> {
    let mut bound = bind(kind.name(), kind.params(), args)?;

    let (payload, result, width) = match kind {
        ComponentKind::Text => {
            let markdown = Value::from(bound.required("markdown")?.to_string());
            let width = bound.width()?;
            (payload([("markdown", markdown.clone())]), markdown, width)
        }
        ComponentKind::Alert => {
            const LEVELS: [&str; 4] = ["info", "success", "warning", "error"];
            let message = Value::from(bound.required("message")?.to_string());
            let level = bound
                .optional("level")
                .map_or_else(|| "info".to_string(), |v| v.to_string());
            if !LEVELS.contains(&level.as_str()) {
                return Err(EvalErrorKind::validation(
                    format!("alert() level '{}' is not supported", level),
                    LEVELS.iter().map(|l| l.to_string()).collect(),
                ));
            }
            let width = bound.width()?;
            (
                payload([("message", message.clone()), ("level", Value::from(level))]),
                message,
                width,
            )
        }
        ComponentKind::Button => {
            let label = bound.required("label")?;
            let width = bound.width()?;
            let value = host.input_state(&id).unwrap_or(Value::Bool(false));
            (
                payload([("label", label), ("value", value.clone())]),
                value,
                width,
            )
        }
        ComponentKind::Checkbox => {
            let label = bound.required("label")?;
            let default = Value::Bool(bound.optional("default").is_some_and(|v| v.is_truthy()));
            let width = bound.width()?;
            let value = host.input_state(&id).unwrap_or(default);
            (
                payload([("label", label), ("value", value.clone())]),
                value,
                width,
            )
        }
        ComponentKind::Slider => {
            let label = bound.required("label")?;
            let min = bound.number("min", 0.0)?;
            let max = bound.number("max", 100.0)?;
            let step = bound.number("step", 1.0)?;
            let default = bound.number("default", min)?;
            let width = bound.width()?;
            if min > max {
                return Err(EvalErrorKind::validation(
                    format!(
                        "slider() min ({}) must not exceed max ({})",
                        Value::Number(min),
                        Value::Number(max)
                    ),
                    Vec::new(),
                ));
            }
            if default < min || default > max {
                return Err(EvalErrorKind::validation(
                    format!(
                        "slider() default {} is outside [{}, {}]",
                        Value::Number(default),
                        Value::Number(min),
                        Value::Number(max)
                    ),
                    Vec::new(),
                ));
            }
            let value = host
                .input_state(&id)
                .unwrap_or(Value::Number(default));
            (
                payload([
                    ("label", label),
                    ("min", Value::Number(min)),
                    ("max", Value::Number(max)),
                    ("step", Value::Number(step)),
                    ("value", value.clone()),
                ]),
                value,
                width,
            )
        }
        ComponentKind::Selectbox => {
            let label = bound.required("label")?;
            let options = bound.required("options")?;
            let Some(choices) = options.as_list() else {
                return Err(EvalErrorKind::type_error(format!(
                    "selectbox() options must be a list, not {}",
                    options.type_name()
                )));
            };
            let default = bound.optional("default");
            if let Some(default) = &default {
                if !choices.contains(default) {
                    return Err(EvalErrorKind::validation(
                        format!("selectbox() default {} is not among its options", default.repr()),
                        choices.iter().map(|c| c.to_string()).collect(),
                    ));
                }
            }
            let width = bound.width()?;
            let fallback = default
                .or_else(|| choices.first().cloned())
                .unwrap_or_default();
            let value = host.input_state(&id).unwrap_or(fallback);
            (
                payload([
                    ("label", label),
                    ("options", options.clone()),
                    ("value", value.clone()),
                ]),
                value,
                width,
            )
        }
        ComponentKind::TextInput => {
            let label = bound.required("label")?;
            let default = bound
                .optional("default")
                .map_or_else(|| Value::from(""), |v| Value::from(v.to_string()));
            let placeholder = bound
                .optional("placeholder")
                .map_or_else(|| Value::from(""), |v| Value::from(v.to_string()));
            let width = bound.width()?;
            let value = host.input_state(&id).unwrap_or(default);
            (
                payload([
                    ("label", label),
                    ("placeholder", placeholder),
                    ("value", value.clone()),
                ]),
                value,
                width,
            )
        }
        ComponentKind::Table => {
            let data = bound.required("data")?;
            let title = bound.optional("title").unwrap_or_default();
            let width = bound.width()?;
            (
                payload([("title", title), ("data", data.clone())]),
                data,
                width,
            )
        }
        ComponentKind::Progress => {
            let label = bound.required("label")?;
            let value = bound.required("value")?;
            let fraction = expect_number("progress", "value", &value)?;
            if !(0.0..=1.0).contains(&fraction) {
                return Err(EvalErrorKind::validation(
                    format!("progress() value must be in [0, 1], got {}", value),
                    Vec::new(),
                ));
            }
            let width = bound.width()?;
            (
                payload([("label", label), ("value", value.clone())]),
                value,
                width,
            )
        }
        ComponentKind::Separator => (Value::Null, Value::Null, 1.0),
    };

    host.emit(OutputUnit::new(id, kind.name(), payload, width));
    Ok(result)
}

// ---- Console output ----

/// The line `print(*args, sep=" ")` writes: each argument's `str()`,
/// joined by `sep`.
pub(crate) fn print_line(args: Args) -> Result<String, EvalErrorKind> {
    let mut sep = String::from(" ");
    for (name, value) in args.keywords {
        match (name.as_str(), value) {
            ("sep", Value::Str(s)) => sep = s.to_string(),
            ("sep", Value::Null) => {}
            ("sep", other) => {
                return Err(EvalErrorKind::type_error(format!(
                    "sep must be None or a string, not {}",
                    other.type_name()
                )))
            }
            (other, _) => {
                return Err(EvalErrorKind::validation(
                    format!("print() got an unexpected keyword argument '{}'", other),
                    vec!["sep".to_string()],
                ))
            }
        }
    }
    let parts: Vec<String> = args.positional.iter().map(Value::to_string).collect();
    Ok(parts.join(&sep))
}

// ---- Pure helpers ----

/// Run a pure builtin. Returns `None` when `name` is not one.
pub(crate) fn call_pure(name: &str, args: Args) -> Option<Result<Value, EvalErrorKind>> {
    let result = match name {
        "len" => unary("len", args).and_then(|v| len(&v)),
        "str" => unary("str", args).map(|v| Value::from(v.to_string())),
        "int" => unary("int", args).and_then(|v| to_int(&v)),
        "float" => unary("float", args).and_then(|v| to_float(&v)),
        "abs" => unary("abs", args)
            .and_then(|v| expect_number("abs", "x", &v))
            .map(|n| Value::Number(n.abs())),
        "upper" => unary("upper", args).and_then(|v| map_str("upper", &v, str::to_uppercase)),
        "lower" => unary("lower", args).and_then(|v| map_str("lower", &v, str::to_lowercase)),
        "round" => round(args),
        "min" => extreme("min", args, Ordering::Less),
        "max" => extreme("max", args, Ordering::Greater),
        "sum" => sum(args),
        "range" => range(args),
        "sorted" => sorted(args),
        _ => return None,
    };
    Some(result)
}

fn unary(func: &'static str, args: Args) -> Result<Value, EvalErrorKind> {
    let mut bound = bind(func, &["x"], args)?;
    bound.required("x")
}

fn len(value: &Value) -> Result<Value, EvalErrorKind> {
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        other => {
            return Err(EvalErrorKind::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Number(n as f64))
}

fn to_int(value: &Value) -> Result<Value, EvalErrorKind> {
    match value {
        Value::Number(n) if n.is_finite() => Ok(Value::Number(n.trunc())),
        Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(n as f64))
            .map_err(|_| {
                EvalErrorKind::type_error(format!("invalid literal for int(): {}", value.repr()))
            }),
        other => Err(EvalErrorKind::type_error(format!(
            "int() argument must be a string or a number, not {}",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> Result<Value, EvalErrorKind> {
    match value {
        Value::Number(_) | Value::Bool(_) => Ok(Value::Number(value.as_f64().unwrap_or(0.0))),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Number).map_err(|_| {
            EvalErrorKind::type_error(format!(
                "could not convert string to float: {}",
                value.repr()
            ))
        }),
        other => Err(EvalErrorKind::type_error(format!(
            "float() argument must be a string or a number, not {}",
            other.type_name()
        ))),
    }
}

fn map_str(
    func: &str,
    value: &Value,
    f: impl Fn(&str) -> String,
) -> Result<Value, EvalErrorKind> {
    value.as_str().map(|s| Value::from(f(s))).ok_or_else(|| {
        EvalErrorKind::type_error(format!(
            "{}() argument must be str, not {}",
            func,
            value.type_name()
        ))
    })
}

fn round(args: Args) -> Result<Value, EvalErrorKind> {
    let mut bound = bind("round", &["x", "ndigits"], args)?;
    let x = bound.required("x")?;
    let x = expect_number("round", "x", &x)?;
    let digits = bound.number("ndigits", 0.0)?;
    let scale = 10f64.powi(digits as i32);
    Ok(Value::Number((x * scale).round() / scale))
}

fn extreme(func: &'static str, args: Args, wanted: Ordering) -> Result<Value, EvalErrorKind> {
    if !args.keywords.is_empty() {
        return Err(EvalErrorKind::validation(
            format!("{}() takes no keyword arguments", func),
            Vec::new(),
        ));
    }
    let items: Vec<Value> = match args.positional.as_slice() {
        [Value::List(items)] => items.as_ref().clone(),
        _ => args.positional,
    };
    let mut best: Option<Value> = None;
    for item in items {
        best = Some(match best {
            None => item,
            Some(current) => match compare_values(&item, &current) {
                Some(ordering) if ordering == wanted => item,
                Some(_) => current,
                None => {
                    return Err(EvalErrorKind::type_error(format!(
                        "'{}' not supported between {} and {}",
                        func,
                        item.type_name(),
                        current.type_name()
                    )))
                }
            },
        });
    }
    best.ok_or_else(|| EvalErrorKind::type_error(format!("{}() arg is an empty sequence", func)))
}

fn sum(args: Args) -> Result<Value, EvalErrorKind> {
    let mut bound = bind("sum", &["iterable", "start"], args)?;
    let iterable = bound.required("iterable")?;
    let start = bound.number("start", 0.0)?;
    let Some(items) = iterable.as_list() else {
        return Err(EvalErrorKind::type_error(format!(
            "sum() argument must be a list, not {}",
            iterable.type_name()
        )));
    };
    items.iter().try_fold(Value::Number(start), |acc, item| {
        let n = expect_number("sum", "iterable", item)?;
        Ok(Value::Number(acc.as_f64().unwrap_or(0.0) + n))
    })
}

fn range(args: Args) -> Result<Value, EvalErrorKind> {
    let mut bound = bind("range", &["start", "stop", "step"], args)?;
    let first = bound.required("start")?;
    let first = expect_number("range", "start", &first)?;
    let (start, stop) = match bound.optional("stop") {
        Some(stop) => (first, expect_number("range", "stop", &stop)?),
        None => (0.0, first),
    };
    let step = bound.number("step", 1.0)?;
    if step == 0.0 {
        return Err(EvalErrorKind::type_error("range() arg 3 must not be zero"));
    }
    let count = ((stop - start) / step).ceil().max(0.0);
    if count > MAX_RANGE_LEN as f64 {
        return Err(EvalErrorKind::type_error(format!(
            "range() of {} items exceeds the limit of {}",
            count, MAX_RANGE_LEN
        )));
    }
    Ok(Value::list(
        (0..count as usize)
            .map(|i| Value::Number(start + step * i as f64))
            .collect(),
    ))
}

fn sorted(args: Args) -> Result<Value, EvalErrorKind> {
    let mut bound = bind("sorted", &["iterable", "reverse"], args)?;
    let iterable = bound.required("iterable")?;
    let reverse = bound.optional("reverse").is_some_and(|v| v.is_truthy());
    let Some(items) = iterable.as_list() else {
        return Err(EvalErrorKind::type_error(format!(
            "sorted() argument must be a list, not {}",
            iterable.type_name()
        )));
    };
    let mut items = items.to_vec();
    let mut failure = None;
    items.sort_by(|a, b| {
        compare_values(a, b).unwrap_or_else(|| {
            failure.get_or_insert_with(|| (a.type_name(), b.type_name()));
            Ordering::Equal
        })
    });
    if let Some((a, b)) = failure {
        return Err(EvalErrorKind::type_error(format!(
            "'<' not supported between {} and {}",
            a, b
        )));
    }
    if reverse {
        items.reverse();
    }
    Ok(Value::list(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::eval::Deadline;

    #[derive(Default)]
    struct Recorder {
        emitted: Vec<OutputUnit>,
        state: IndexMap<UnitId, Value>,
    }

    impl Host for Recorder {
        fn global(&mut self, _name: &str) -> Option<Value> {
            None
        }

        fn input_state(&self, unit: &UnitId) -> Option<Value> {
            self.state.get(unit).cloned()
        }

        fn emit(&mut self, unit: OutputUnit) {
            self.emitted.push(unit);
        }

        fn print(&mut self, _line: String) {}

        fn deadline(&self) -> Option<Deadline> {
            None
        }
    }

    fn args(positional: Vec<Value>, keywords: &[(&str, Value)]) -> Args {
        Args {
            positional,
            keywords: keywords
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn slider_returns_default_then_state() {
        let mut host = Recorder::default();
        let id = UnitId::from("slider-test");
        let value = call_component(
            ComponentKind::Slider,
            id.clone(),
            args(
                vec![Value::from("N")],
                &[("min", 0.into()), ("max", 10.into()), ("default", 5.into())],
            ),
            &mut host,
        )
        .unwrap();
        assert_eq!(value, Value::from(5));
        assert_eq!(host.emitted.len(), 1);
        assert_eq!(host.emitted[0].kind, "slider");

        host.state.insert(id.clone(), Value::from(8));
        let value = call_component(
            ComponentKind::Slider,
            id,
            args(vec![Value::from("N")], &[("max", 10.into())]),
            &mut host,
        )
        .unwrap();
        assert_eq!(value, Value::from(8));
    }

    #[test]
    fn unknown_keyword_lists_valid_parameters() {
        let mut host = Recorder::default();
        let err = call_component(
            ComponentKind::Text,
            UnitId::from("text-x"),
            args(vec![Value::from("hi")], &[("colour", "red".into())]),
            &mut host,
        )
        .unwrap_err();
        match err {
            EvalErrorKind::Validation { alternatives, .. } => {
                assert_eq!(alternatives, vec!["markdown".to_string(), "size".to_string()]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(host.emitted.is_empty());
    }

    #[test]
    fn selectbox_default_must_be_an_option() {
        let mut host = Recorder::default();
        let options = Value::list(vec!["a".into(), "b".into()]);
        let err = call_component(
            ComponentKind::Selectbox,
            UnitId::from("selectbox-x"),
            args(vec!["Pick".into(), options], &[("default", "z".into())]),
            &mut host,
        )
        .unwrap_err();
        match err {
            EvalErrorKind::Validation { alternatives, .. } => {
                assert_eq!(alternatives, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn width_outside_unit_interval_is_rejected() {
        let mut host = Recorder::default();
        for size in [0.0, -0.5, 1.5] {
            let err = call_component(
                ComponentKind::Text,
                UnitId::from("text-x"),
                args(vec!["hi".into()], &[("size", size.into())]),
                &mut host,
            )
            .unwrap_err();
            assert!(matches!(err, EvalErrorKind::Validation { .. }));
        }
    }

    #[test]
    fn separator_emits_full_width_break() {
        let mut host = Recorder::default();
        let value = call_component(
            ComponentKind::Separator,
            UnitId::from("separator-x"),
            Args::default(),
            &mut host,
        )
        .unwrap();
        assert!(value.is_null());
        assert!(host.emitted[0].is_row_break());
    }

    #[test]
    fn pure_helpers() {
        let call = |name: &str, positional: Vec<Value>| call_pure(name, args(positional, &[])).unwrap();

        assert_eq!(call("len", vec!["héllo".into()]).unwrap(), Value::from(5));
        assert_eq!(call("int", vec!["42".into()]).unwrap(), Value::from(42));
        assert_eq!(call("int", vec![Value::Number(3.9)]).unwrap(), Value::from(3));
        assert_eq!(call("max", vec![1.into(), 7.into(), 3.into()]).unwrap(), Value::from(7));
        assert_eq!(
            call("min", vec![Value::list(vec![4.into(), 2.into()])]).unwrap(),
            Value::from(2)
        );
        assert_eq!(
            call("range", vec![3.into()]).unwrap(),
            Value::list(vec![0.into(), 1.into(), 2.into()])
        );
        assert_eq!(
            call("sum", vec![Value::list(vec![1.into(), 2.5.into()])]).unwrap(),
            Value::Number(3.5)
        );
        assert_eq!(call("upper", vec!["ab".into()]).unwrap(), Value::from("AB"));
        assert!(call_pure("nope", Args::default()).is_none());
    }

    #[test]
    fn sorted_rejects_mixed_types() {
        let mixed = Value::list(vec![1.into(), "a".into()]);
        let err = call_pure("sorted", args(vec![mixed], &[])).unwrap().unwrap_err();
        assert!(matches!(err, EvalErrorKind::Type(_)));
    }

    #[test]
    fn round_with_digits() {
        let value = call_pure("round", args(vec![Value::Number(3.14159)], &[("ndigits", 2.into())]))
            .unwrap()
            .unwrap();
        assert_eq!(value, Value::Number(3.14));
    }

    #[test]
    fn print_joins_arguments_with_sep() {
        let line = print_line(args(vec![Value::from("a"), Value::from(2), Value::Null], &[])).unwrap();
        assert_eq!(line, "a 2 None");

        let line = print_line(args(vec![Value::from(1), Value::from(2)], &[("sep", Value::from("-"))])).unwrap();
        assert_eq!(line, "1-2");

        let err = print_line(args(vec![], &[("end", Value::from(""))])).unwrap_err();
        assert!(matches!(err, EvalErrorKind::Validation { .. }));
    }
}
