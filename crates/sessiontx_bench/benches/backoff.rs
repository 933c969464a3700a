//! Backoff benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sessiontx_bench::InstantClock;
use sessiontx_core::{BackoffConfig, CancellationToken, ExponentialBackoff};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark the bookkeeping of a wait on a clock that never sleeps.
fn bench_wait_bookkeeping(c: &mut Criterion) {
    let backoff = ExponentialBackoff::with_clock(
        CancellationToken::new(),
        Arc::new(InstantClock),
        BackoffConfig::new(Duration::from_secs(60)),
    );

    c.bench_function("wait_instant_clock", |b| {
        b.iter(|| {
            black_box(backoff.wait());
        });
    });
}

/// Benchmark delay computation alone.
fn bench_next_delay(c: &mut Criterion) {
    let config = BackoffConfig::new(Duration::from_secs(60));

    c.bench_function("next_delay_16", |b| {
        b.iter(|| {
            let mut delay = config.first_delay();
            for _ in 0..16 {
                delay = config.next_delay(black_box(delay));
            }
            black_box(delay);
        });
    });
}

/// Benchmark reset between waits.
fn bench_wait_reset(c: &mut Criterion) {
    let backoff = ExponentialBackoff::with_clock(
        CancellationToken::new(),
        Arc::new(InstantClock),
        BackoffConfig::default(),
    );

    c.bench_function("wait_then_reset", |b| {
        b.iter(|| {
            black_box(backoff.wait());
            black_box(backoff.wait());
            backoff.reset();
        });
    });
}

criterion_group!(benches, bench_wait_bookkeeping, bench_next_delay, bench_wait_reset);

criterion_main!(benches);
