use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use resource_graph::{Resources, ResourcesBuilder};

/// Chain `/link(len - 1) -> ... -> /link(0) -> /input`.
fn build_chain() -> Resources {
    ResourcesBuilder::new()
        .add_global("/input", 0i64)
        .add("/link", |deps, args| {
            let index = args.uint(0)?;
            if index == 0 {
                return Ok(*deps.get::<i64>("/input", ())? + 1);
            }
            Ok(*deps.get::<i64>("/link", index - 1)? + 1)
        })
        .build()
        .unwrap()
}

/// Reading the top of a chain when nothing changed.
fn bench_chain_cached(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_cached_get");
    for &len in &[10_u64, 100, 500] {
        let mut resources = build_chain();
        resources.get::<i64>("/link", len - 1).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| resources.get::<i64>("/link", black_box(len - 1)).unwrap());
        });
    }
    group.finish();
}

/// `set` at the bottom of a chain followed by a read of the top.
fn bench_chain_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_set_then_get");
    for &len in &[10_u64, 100, 500] {
        let mut resources = build_chain();
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let mut v = 0_i64;
            b.iter(|| {
                v = v.wrapping_add(1);
                resources.set("/input", black_box(v)).unwrap();
                resources.get::<i64>("/link", len - 1).unwrap()
            });
        });
    }
    group.finish();
}

/// Per-frame walk after a collection, when every node must be re-stamped.
fn bench_chain_after_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_collect_then_get");
    for &len in &[10_u64, 100, 500] {
        let mut resources = build_chain();
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| {
                resources.get::<i64>("/link", len - 1).unwrap();
                resources.collect()
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_chain_cached,
    bench_chain_rerun,
    bench_chain_after_collect
);
criterion_main!(benches);
