//! Integration Tests for the Script Engine
//!
//! These tests drive whole scripts through the runner and check that
//! incremental reruns agree with running the script from the top.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use trellis_core::graph::{NodeId, NodeStatus, Workflow};
use trellis_core::render::{InputTable, LayoutPacker, Row, UnitId};
use trellis_core::runtime::{interpret, Outbound, Outbox, RerunOutcome, RunState, ScriptRunner, SessionId};
use trellis_core::script::{parse, ScriptSource};
use trellis_core::transform::Transformer;
use trellis_core::{EngineConfig, NodeError, RetryPolicy, Value};

const SCENARIO: &str = "\
a = slider(\"A\", min=0, max=20, default=5)
b = a + 1
text(f\"B is {b}\")
text(\"C\")
";

const DASHBOARD: &str = "\
def total(count):
    acc = 0
    for i in range(count):
        acc = acc + i * factor
    return acc

factor = 3
n = slider(\"N\", min=1, max=10, default=2)
t = total(n)
text(f\"Total {t}\", size=0.5)
text(f\"Count {n}\", size=0.5)
flag = checkbox(\"Show\", default=True)
separator()
text(\"footer\")
";

fn config() -> EngineConfig {
    EngineConfig::default().with_debounce(Duration::ZERO)
}

fn started(source: &str, config: EngineConfig) -> ScriptRunner {
    let mut runner = ScriptRunner::new(SessionId::from("it"), config);
    runner.start(ScriptSource::new("app.tr", source)).unwrap();
    runner
}

fn unit_of(runner: &ScriptRunner, kind: &str) -> UnitId {
    runner
        .layout()
        .iter()
        .flatten()
        .find(|placed| placed.unit.kind == kind)
        .map(|placed| placed.unit.id.clone())
        .unwrap()
}

fn texts(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .flatten()
        .filter(|placed| placed.unit.kind == "text")
        .filter_map(|placed| placed.unit.value.as_map()?.get("markdown").map(Value::to_string))
        .collect()
}

fn change(id: UnitId, value: impl Into<Value>) -> IndexMap<UnitId, Value> {
    [(id, value.into())].into_iter().collect()
}

/// Flatten rows to (id, kind, value, flex) for comparisons.
fn shape(rows: &[Row]) -> Vec<Vec<(String, String, String, String)>> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|p| {
                    (
                        p.unit.id.to_string(),
                        p.unit.kind.clone(),
                        p.unit.value.repr(),
                        format!("{:.6}", p.flex),
                    )
                })
                .collect()
        })
        .collect()
}

/// The layout of interpreting `source` from the top with `inputs`.
fn reference_layout(source: &str, inputs: &InputTable) -> Vec<Row> {
    let module = parse(source).unwrap();
    let units = interpret(&module, "app.tr", inputs, 64).unwrap();
    LayoutPacker::pack(units)
}

// ---- Scenarios ----

#[test]
fn changing_a_recomputes_b_but_not_c() {
    let mut runner = started(SCENARIO, config());
    assert_eq!(texts(runner.layout()), vec!["B is 6", "C"]);

    let c = NodeId::from("atom_00004_001_text");
    let attempts = runner.workflow().node(&c).unwrap().attempts();

    let slider = unit_of(&runner, "slider");
    let outcome = runner.rerun(change(slider, 10)).unwrap();

    let RerunOutcome::Incremental { affected } = outcome else {
        panic!("expected an incremental rerun");
    };
    assert_eq!(affected.len(), 3);
    assert!(!affected.contains(&c));
    assert_eq!(texts(runner.layout()), vec!["B is 11", "C"]);
    assert_eq!(runner.workflow().node(&c).unwrap().attempts(), attempts);
}

#[test]
fn functions_and_globals_rerun_with_their_readers() {
    let mut runner = started(DASHBOARD, config());
    assert_eq!(texts(runner.layout()), vec!["Total 3", "Count 2", "footer"]);

    let slider = unit_of(&runner, "slider");
    runner.rerun(change(slider, 4)).unwrap();
    // (0 + 1 + 2 + 3) * 3
    assert_eq!(texts(runner.layout()), vec!["Total 18", "Count 4", "footer"]);
}

#[test]
fn half_width_units_share_a_row() {
    let runner = started(DASHBOARD, config());
    let rows = runner.layout();

    // slider | total+count | checkbox | footer; the separator is not placed
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1].len(), 2);
    assert!((rows[1][0].flex - 0.5).abs() < 1e-9);
    assert!(rows.iter().flatten().all(|p| p.unit.kind != "separator"));
}

// ---- Equivalence with running from the top ----

#[test]
fn incremental_layout_matches_full_interpretation() {
    let mut runner = started(DASHBOARD, config());
    assert_eq!(shape(runner.layout()), shape(&reference_layout(DASHBOARD, &InputTable::new())));

    let slider = unit_of(&runner, "slider");
    let checkbox = unit_of(&runner, "checkbox");
    runner.rerun(change(slider, 7)).unwrap();
    runner.rerun(change(checkbox, false)).unwrap();

    let expected = reference_layout(DASHBOARD, runner.inputs());
    assert_eq!(shape(runner.layout()), shape(&expected));
}

#[test]
fn full_rerun_mode_matches_incremental_mode() {
    let mut incremental = started(DASHBOARD, config());
    let mut full = started(DASHBOARD, config().with_incremental(false));
    assert_eq!(shape(incremental.layout()), shape(full.layout()));

    let slider = unit_of(&incremental, "slider");
    assert_eq!(slider, unit_of(&full, "slider"));

    assert!(matches!(
        incremental.rerun(change(slider.clone(), 9)).unwrap(),
        RerunOutcome::Incremental { .. }
    ));
    assert_eq!(full.rerun(change(slider, 9)).unwrap(), RerunOutcome::FullRerun);
    assert_eq!(shape(incremental.layout()), shape(full.layout()));
}

#[test]
fn unsupported_script_falls_back_and_still_renders() {
    let source = "n = slider(\"N\", min=0, max=5, default=1)\nif n > 2:\n    text(\"big\")\ntext(f\"n={n}\")\n";
    let mut runner = started(source, config());
    assert_eq!(texts(runner.layout()), vec!["n=1"]);

    let slider = unit_of(&runner, "slider");
    assert_eq!(runner.rerun(change(slider, 3)).unwrap(), RerunOutcome::FullRerun);
    assert_eq!(texts(runner.layout()), vec!["big", "n=3"]);
}

// ---- Determinism ----

#[test]
fn transform_is_deterministic() {
    let first = Transformer::new("app.tr").transform(DASHBOARD).unwrap();
    let second = Transformer::new("app.tr").transform(DASHBOARD).unwrap();

    assert_eq!(first.node_ids(), second.node_ids());
    assert_eq!(first.edges(), second.edges());
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn unit_ids_are_stable_across_sessions() {
    let one = started(DASHBOARD, config());
    let two = started(DASHBOARD, config());
    assert_eq!(shape(one.layout()), shape(two.layout()));
}

#[test]
fn repeating_a_rerun_is_idempotent() {
    let mut runner = started(SCENARIO, config());
    let outbox = Outbox::new();
    runner.attach(outbox.transport());
    outbox.drain();

    let slider = unit_of(&runner, "slider");
    runner.rerun(change(slider.clone(), 12)).unwrap();
    let layout = shape(runner.layout());
    outbox.drain();

    assert_eq!(runner.rerun(change(slider, 12)).unwrap(), RerunOutcome::Unchanged);
    assert_eq!(shape(runner.layout()), layout);
    assert!(outbox.is_empty());
}

// ---- Failures ----

#[test]
fn upstream_failure_blocks_dependents() {
    let source = "d = slider(\"D\", min=0, max=4, default=0)\nq = 8 / d\ntext(f\"q={q}\")\ntext(\"ok\")\n";
    let mut runner = started(source, config());
    assert_eq!(runner.state(), RunState::Running);
    assert_eq!(texts(runner.layout()), vec!["ok"]);

    let quotient = NodeId::from("atom_00002_001_expr");
    let reader = NodeId::from("atom_00003_001_text");
    assert_eq!(runner.workflow().node(&quotient).unwrap().status(), NodeStatus::Error);
    assert!(matches!(
        runner.workflow().node(&reader).unwrap().last_error(),
        Some(NodeError::UpstreamFailed(id)) if *id == quotient
    ));

    let slider = unit_of(&runner, "slider");
    runner.rerun(change(slider, 4)).unwrap();
    assert_eq!(texts(runner.layout()), vec!["q=2", "ok"]);
}

#[test]
fn earlier_failure_keeps_blocking_after_unrelated_input() {
    let source = "\
d = slider(\"D\", min=0, max=4, default=2)
e = slider(\"E\", min=0, max=9, default=1)
x = 10 / d
text(f\"x={x} e={e}\")
";
    let mut runner = started(source, config());
    assert_eq!(texts(runner.layout()), vec!["x=5 e=1"]);

    let sliders: Vec<UnitId> = runner
        .layout()
        .iter()
        .flatten()
        .filter(|placed| placed.unit.kind == "slider")
        .map(|placed| placed.unit.id.clone())
        .collect();
    let (d, e) = (sliders[0].clone(), sliders[1].clone());

    runner.rerun(change(d.clone(), 0)).unwrap();
    assert!(texts(runner.layout()).is_empty());

    // Only `e` changes; the stale quotient must not render
    runner.rerun(change(e, 7)).unwrap();
    assert!(texts(runner.layout()).is_empty());
    let reader = NodeId::from("atom_00004_001_text");
    assert!(matches!(
        runner.workflow().node(&reader).unwrap().last_error(),
        Some(NodeError::UpstreamFailed(id)) if *id == NodeId::from("atom_00003_001_expr")
    ));

    runner.rerun(change(d, 1)).unwrap();
    assert_eq!(texts(runner.layout()), vec!["x=10 e=7"]);
}

#[test]
fn script_errors_are_sent_to_observers() {
    let mut runner = ScriptRunner::new(SessionId::from("it"), config().with_incremental(false));
    let outbox = Outbox::new();
    runner.attach(outbox.transport());

    let err = runner
        .start(ScriptSource::new("app.tr", "text(undefined_name)\n"))
        .unwrap_err();
    assert!(err.to_string().contains("undefined_name"));
    assert_eq!(runner.state(), RunState::Error);

    let messages = outbox.drain();
    assert!(matches!(messages.last(), Some(Outbound::Error { .. })));
}

#[test]
fn transient_failures_are_retried() {
    let mut workflow = Workflow::with_config(
        &config().with_retry(RetryPolicy::new(3, Duration::from_millis(1), 1.0)),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    workflow
        .register(
            "flaky",
            [],
            Arc::new(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(NodeError::custom("not yet"))
                } else {
                    Ok(Value::from(1))
                }
            }),
        )
        .unwrap();

    let report = workflow.execute(None, &InputTable::new());
    assert!(report.failed.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(workflow.value(&NodeId::from("flaky")), Some(&Value::from(1)));
}
