use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use trellis_core::render::{InputTable, UnitId};
use trellis_core::runtime::{ScriptRunner, SessionId};
use trellis_core::script::ScriptSource;
use trellis_core::transform::Transformer;
use trellis_core::{EngineConfig, Value};

/// A slider followed by `len` chained assignments, each shown, plus `len`
/// static texts that never depend on the slider.
fn script(len: usize) -> String {
    let mut source = String::from("v0 = slider(\"V\", min=0, max=100, default=1)\n");
    for i in 1..=len {
        source.push_str(&format!("v{i} = v{} * 2 + 1\n", i - 1));
        source.push_str(&format!("text(f\"v{i} = {{v{i}}}\", size=0.5)\n"));
        source.push_str(&format!("text(\"static {i}\", size=0.5)\n"));
    }
    source
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    for len in [10usize, 100] {
        let source = script(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &source, |b, source| {
            let transformer = Transformer::new("bench.tr");
            b.iter(|| transformer.transform(black_box(source)).unwrap());
        });
    }
    group.finish();
}

fn bench_affected(c: &mut Criterion) {
    let mut group = c.benchmark_group("affected");
    for len in [10usize, 100] {
        let runner = started(len, true);
        let head = runner.program().unwrap().node_ids()[0].clone();
        let workflow = runner.workflow();
        group.bench_with_input(BenchmarkId::from_parameter(len), &head, |b, head| {
            b.iter(|| workflow.affected([black_box(head)]));
        });
    }
    group.finish();
}

fn started(len: usize, incremental: bool) -> ScriptRunner {
    let config = EngineConfig::default()
        .with_debounce(Duration::ZERO)
        .with_incremental(incremental);
    let mut runner = ScriptRunner::new(SessionId::from("bench"), config);
    runner
        .start(ScriptSource::new("bench.tr", script(len)))
        .unwrap();
    runner
}

fn slider(runner: &ScriptRunner) -> UnitId {
    runner
        .layout()
        .iter()
        .flatten()
        .find(|placed| placed.unit.kind == "slider")
        .map(|placed| placed.unit.id.clone())
        .unwrap()
}

fn bench_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("rerun");
    for (name, incremental) in [("incremental", true), ("full", false)] {
        for len in [10usize, 100] {
            let mut runner = started(len, incremental);
            let id = slider(&runner);
            let mut value = 0i64;
            group.bench_function(BenchmarkId::new(name, len), |b| {
                b.iter(|| {
                    value = (value + 1) % 100;
                    let changes: InputTable = [(id.clone(), Value::from(value))].into_iter().collect();
                    runner.rerun(black_box(changes)).unwrap()
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_transform, bench_affected, bench_rerun);
criterion_main!(benches);
