//! Benchmarks for delta calculation, replay and reconciliation

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vellum_core::{ElementMap, ErrorPolicy, Sequence};
use vellum_delta::{ChangeSet, ElementsDelta};
use vellum_reconcile::{reconcile, RemoteElement};
use vellum_test::{FuzzerConfig, SceneFuzzer};

fn fuzzed_scenes(element_count: usize, op_count: usize) -> (ElementMap, ElementMap) {
    let config = FuzzerConfig {
        element_count,
        op_count,
        ..FuzzerConfig::default()
    };
    let mut fuzzer = SceneFuzzer::new(config);
    let start = fuzzer.seed_scene();
    let scenes = fuzzer.mutation_chain(start);
    let first = scenes.first().expect("chain start").clone();
    let last = scenes.last().expect("chain end").clone();
    (first, last)
}

fn bench_calculate(c: &mut Criterion) {
    let (prev, next) = fuzzed_scenes(1_000, 200);

    c.bench_function("elements_delta_calculate_1k", |b| {
        b.iter(|| black_box(ElementsDelta::calculate(black_box(&prev), black_box(&next))))
    });
}

fn bench_apply(c: &mut Criterion) {
    let (prev, next) = fuzzed_scenes(1_000, 200);
    let delta = ElementsDelta::calculate(&prev, &next);
    let snapshot = ElementMap::new();

    c.bench_function("elements_delta_apply_1k", |b| {
        b.iter(|| {
            black_box(
                delta
                    .apply_to(black_box(&prev), &snapshot, ErrorPolicy::lenient())
                    .expect("lenient apply never fails"),
            )
        })
    });
}

fn bench_inverse(c: &mut Criterion) {
    let (prev, next) = fuzzed_scenes(1_000, 200);
    let delta = ElementsDelta::calculate(&prev, &next);

    c.bench_function("elements_delta_inverse_1k", |b| {
        b.iter(|| black_box(black_box(&delta).inverse()))
    });
}

fn bench_reconcile(c: &mut Criterion) {
    let (base, edited) = fuzzed_scenes(1_000, 100);
    let local: Sequence = base.values().cloned().collect();
    let remote: Vec<RemoteElement> = edited
        .values()
        .filter(|element| {
            base.get(&element.id)
                .map(|prev| prev.version_nonce != element.version_nonce)
                .unwrap_or(true)
        })
        .map(|element| RemoteElement::new(element.clone()))
        .collect();

    c.bench_function("reconcile_1k_local", |b| {
        b.iter(|| black_box(reconcile(black_box(&local), black_box(&remote))))
    });
}

criterion_group!(
    benches,
    bench_calculate,
    bench_apply,
    bench_inverse,
    bench_reconcile
);
criterion_main!(benches);
