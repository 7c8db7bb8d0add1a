//! Benchmarks for the segmented matched filter
//!
//! Run with: cargo bench -p secc-core --bench matched_filter_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use secc_core::config::{EngineConfig, ExecutionMode};
use secc_core::matched_filter::compute_with_config;
use secc_core::prelude::*;
use secc_core::reference::direct_matched_filter;
use std::time::Duration;

const LEN_DATA: usize = 20_000;
const LEN_TEMPLATE: usize = 200;
const N_COMPONENT: usize = 3;
const N_STATION: usize = 4;
const N_TEMPLATE: usize = 4;

struct Problem {
    data: Waveforms,
    templates: Templates,
    moveouts: Moveouts,
    weights: Weights,
}

fn problem(len_data: usize) -> Problem {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let normal = Normal::new(0.0, 1.0).unwrap();

    let mut data = Waveforms::zeros(len_data, N_COMPONENT, N_STATION);
    let mut templates = Templates::zeros(LEN_TEMPLATE, N_COMPONENT, N_STATION, N_TEMPLATE);
    for i in 0..N_STATION {
        for j in 0..N_COMPONENT {
            for x in data.channel_mut(i, j) {
                *x = normal.sample(&mut rng);
            }
            for l in 0..N_TEMPLATE {
                for x in templates.template_mut(i, j, l) {
                    *x = normal.sample(&mut rng);
                }
            }
        }
    }

    let mut moveouts = Moveouts::zeros(N_STATION, N_TEMPLATE);
    for i in 0..N_STATION {
        for l in 0..N_TEMPLATE {
            moveouts.set(i, l, (i * 10 + l) as i64);
        }
    }

    Problem {
        data,
        templates,
        moveouts,
        weights: Weights::filled(N_STATION, N_TEMPLATE, 1.0),
    }
}

// ============================================================================
// Segment Length Sweep
// ============================================================================

fn bench_segment_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_length");
    let p = problem(LEN_DATA);
    let config = EngineConfig::default();

    group.throughput(Throughput::Elements(LEN_DATA as u64));

    for k in [512usize, 1024, 4096, 16384].iter() {
        group.bench_with_input(BenchmarkId::new("spectral", k), k, |b, &k| {
            b.iter(|| {
                compute_with_config(
                    black_box(&p.data),
                    black_box(&p.templates),
                    k,
                    &p.moveouts,
                    &p.weights,
                    &config,
                    &mut NullSink,
                )
            })
        });
    }

    group.finish();
}

// ============================================================================
// Spectral vs Direct
// ============================================================================

fn bench_spectral_vs_direct(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectral_vs_direct");
    let p = problem(4_000);
    let config = EngineConfig::default().with_threads(1);

    group.bench_function("spectral_k1024", |b| {
        b.iter(|| {
            compute_with_config(
                black_box(&p.data),
                black_box(&p.templates),
                1024,
                &p.moveouts,
                &p.weights,
                &config,
                &mut NullSink,
            )
        })
    });

    group.bench_function("direct", |b| {
        b.iter(|| direct_matched_filter(black_box(&p.data), black_box(&p.templates), &p.moveouts, &p.weights))
    });

    group.finish();
}

// ============================================================================
// Execution Modes
// ============================================================================

fn bench_execution_mode(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution_mode");
    let p = problem(LEN_DATA);

    for (name, mode) in [
        ("sequential", ExecutionMode::Sequential),
        ("station_parallel", ExecutionMode::StationParallel),
    ] {
        let config = EngineConfig::default().with_execution(mode);
        group.bench_function(name, |b| {
            b.iter(|| {
                compute_with_config(
                    black_box(&p.data),
                    black_box(&p.templates),
                    4096,
                    &p.moveouts,
                    &p.weights,
                    &config,
                    &mut NullSink,
                )
            })
        });
    }

    group.finish();
}

criterion_group!(
    name = segment_benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = bench_segment_length, bench_execution_mode
);

criterion_group!(
    name = reference_benches;
    config = Criterion::default().sample_size(10);
    targets = bench_spectral_vs_direct
);

criterion_main!(segment_benches, reference_benches);
