//! Correlation call benchmarks
//!
//! Run with: cargo bench --bench correlate_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::time::Duration;

use noise_xcorr::filter::BandFilter;
use noise_xcorr::{CorrelationConfig, Engine, FdStage, Matrix, SoloGroup, TdStage, ThreadGroup};

const FS: f64 = 20.0;
const NPTS: usize = 12_000;

fn channels(n: usize) -> Matrix<f64> {
    let mut rng = StdRng::seed_from_u64(1);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let columns: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..NPTS).map(|_| normal.sample(&mut rng)).collect())
        .collect();
    Matrix::from_columns(&columns).unwrap()
}

fn config(n: usize) -> CorrelationConfig {
    let combinations = (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect();
    CorrelationConfig::new(FS, 50.0)
        .with_start_times(vec![0.0; n])
        .with_combinations(combinations)
        .with_td_stages(vec![TdStage::Filter(BandFilter::bandpass(0.1, 5.0))])
        .with_fd_stages(vec![FdStage::SpectralWhitening])
}

/// Single worker, growing channel count
fn bench_channel_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlate_solo");
    group.measurement_time(Duration::from_secs(10));
    let engine = Engine::new();

    for n in [4, 8, 16] {
        let data = channels(n);
        let cfg = config(n);
        group.throughput(Throughput::Elements(cfg.combinations.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &data, |b, data| {
            b.iter(|| engine.correlate(&SoloGroup, black_box(data.clone()), &cfg))
        });
    }
    group.finish();
}

/// Fixed problem, growing worker group
fn bench_worker_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlate_workers");
    group.measurement_time(Duration::from_secs(10));
    let engine = Engine::new();
    let data = channels(12);
    let cfg = config(12);

    for workers in [1, 2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| ThreadGroup::run(workers, |g| engine.correlate(g, black_box(data.clone()), &cfg)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_channel_count, bench_worker_count);
criterion_main!(benches);
