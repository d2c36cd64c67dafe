//! Property Tests
//!
//! Random graphs and random scripts checked against the engine's
//! structural guarantees.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use trellis_core::graph::{NodeBody, NodeId, Workflow};
use trellis_core::render::{InputTable, LayoutPacker, UnitId};
use trellis_core::runtime::{interpret, ScriptRunner, SessionId};
use trellis_core::script::{parse, ScriptSource};
use trellis_core::{EngineConfig, Value};

fn sum_plus_one() -> NodeBody {
    Arc::new(|cx| {
        let total: f64 = cx.args().iter().filter_map(Value::as_f64).sum();
        Ok(Value::Number(total + 1.0))
    })
}

fn node(i: usize) -> NodeId {
    NodeId::from(format!("n{i:03}"))
}

/// A DAG where node `i` may depend on any node before it.
fn dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..24).prop_flat_map(|n| {
        (0..n)
            .map(|i| prop::collection::btree_set(0..i.max(1), 0..=i.min(3)).prop_map(move |deps| {
                deps.into_iter().filter(|d| *d < i).collect::<Vec<_>>()
            }))
            .collect::<Vec<_>>()
    })
}

fn build(graph: &[Vec<usize>]) -> Workflow {
    let mut workflow = Workflow::new();
    for (i, deps) in graph.iter().enumerate() {
        workflow
            .register(node(i), deps.iter().map(|d| node(*d)), sum_plus_one())
            .unwrap();
    }
    workflow
}

proptest! {
    #[test]
    fn order_respects_every_edge(graph in dag()) {
        let workflow = build(&graph);
        let order = workflow.order();
        prop_assert_eq!(order.len(), graph.len());

        let position: HashMap<&NodeId, usize> = order.iter().enumerate().map(|(i, id)| (id, i)).collect();
        for (i, deps) in graph.iter().enumerate() {
            for d in deps {
                prop_assert!(position[&node(*d)] < position[&node(i)]);
            }
        }
    }

    #[test]
    fn affected_is_closed_under_dependents(graph in dag(), pick in any::<prop::sample::Index>()) {
        let workflow = build(&graph);
        let changed = node(pick.index(graph.len()));
        let affected = workflow.affected([&changed]);

        prop_assert!(affected.contains(&changed));
        for (i, deps) in graph.iter().enumerate() {
            if deps.iter().any(|d| affected.contains(&node(*d))) {
                prop_assert!(affected.contains(&node(i)));
            }
        }
    }

    #[test]
    fn selective_execute_matches_full_execute(graph in dag(), pick in any::<prop::sample::Index>()) {
        let mut selective = build(&graph);
        selective.execute(None, &InputTable::new());

        let changed = node(pick.index(graph.len()));
        let affected: BTreeSet<NodeId> = selective.affected([&changed]);
        let report = selective.execute(Some(&affected), &InputTable::new());
        prop_assert_eq!(report.executed.len(), affected.len());

        let mut full = build(&graph);
        full.execute(None, &InputTable::new());
        for i in 0..graph.len() {
            prop_assert_eq!(selective.value(&node(i)), full.value(&node(i)));
        }
    }
}

// ---- Random scripts ----

/// One line of a generated script over variables `v0..`.
#[derive(Debug, Clone)]
enum Line {
    Assign { from: usize, add: i64 },
    Show { var: usize, size: u8 },
    Break,
}

fn script() -> impl Strategy<Value = Vec<Line>> {
    prop::collection::vec(
        prop_oneof![
            (any::<prop::sample::Index>(), -5i64..5).prop_map(|(from, add)| Line::Assign {
                from: from.index(usize::MAX),
                add
            }),
            (any::<prop::sample::Index>(), 1u8..=4).prop_map(|(var, size)| Line::Show {
                var: var.index(usize::MAX),
                size
            }),
            Just(Line::Break),
        ],
        0..16,
    )
}

/// Render to source. Line 1 is always the slider binding `v0`.
fn render(lines: &[Line]) -> String {
    let mut source = String::from("v0 = slider(\"V\", min=0, max=100, default=1)\n");
    let mut vars = 1;
    for line in lines {
        match line {
            Line::Assign { from, add } => {
                source.push_str(&format!("v{vars} = v{} + {add}\n", from % vars));
                vars += 1;
            }
            Line::Show { var, size } => {
                let width = f64::from(*size) / 4.0;
                source.push_str(&format!("text(f\"v={{v{}}}\", size={width})\n", var % vars));
            }
            Line::Break => source.push_str("separator()\n"),
        }
    }
    source
}

fn flat(rows: &[trellis_core::render::Row]) -> Vec<(String, String, String)> {
    rows.iter()
        .flatten()
        .map(|p| (p.unit.id.to_string(), p.unit.value.repr(), format!("{:.6}", p.flex)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn incremental_rerun_matches_interpretation(lines in script(), value in 0i64..100) {
        let source = render(&lines);
        let mut runner = ScriptRunner::new(
            SessionId::from("prop"),
            EngineConfig::default().with_debounce(Duration::ZERO),
        );
        runner.start(ScriptSource::new("app.tr", source.as_str())).unwrap();

        let slider: UnitId = runner
            .layout()
            .iter()
            .flatten()
            .find(|p| p.unit.kind == "slider")
            .map(|p| p.unit.id.clone())
            .unwrap();
        runner.rerun([(slider, Value::from(value))].into_iter().collect()).unwrap();

        let module = parse(&source).unwrap();
        let units = interpret(&module, "app.tr", runner.inputs(), 64).unwrap();
        let expected = LayoutPacker::pack(units);
        prop_assert_eq!(flat(runner.layout()), flat(&expected));
    }
}
