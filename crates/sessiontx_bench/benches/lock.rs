//! Session lock benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sessiontx_bench::{labels, nest};
use sessiontx_core::{CompletionSignal, LockError, SessionConfig, SessionLock};
use std::sync::Arc;
use std::thread;

/// Benchmark an uncontended single-level chain.
fn bench_uncontended_tx(c: &mut Criterion) {
    let session = SessionLock::new(SessionConfig::default());

    c.bench_function("uncontended_tx", |b| {
        b.iter(|| {
            let value: Result<u64, LockError> = session.tx(|_| Ok(black_box(42)));
            black_box(value.unwrap());
        });
    });
}

/// Benchmark nesting on one handle at increasing depths.
fn bench_nested_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_depth");
    let session = SessionLock::new(SessionConfig::default());

    for depth in [1usize, 4, 16, 64].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            b.iter(|| {
                let tx = session.transaction(CompletionSignal::new());
                nest(&tx, black_box(depth)).unwrap();
                black_box(tx.is_completed());
            });
        });
    }

    group.finish();
}

/// Benchmark explicit begin_named/done pairs with composed names.
fn bench_named_steps(c: &mut Criterion) {
    let session = SessionLock::new(SessionConfig::new().initiator("bench"));
    let steps = labels(8);

    c.bench_function("named_steps_8", |b| {
        b.iter(|| {
            let tx = session.transaction(CompletionSignal::new());
            for step in &steps {
                tx.begin_named(step).unwrap();
            }
            for _ in &steps {
                tx.done().unwrap();
            }
            black_box(tx.name());
        });
    });
}

/// Benchmark chains racing for the session from several threads.
fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_chains");
    group.sample_size(20);

    for threads in [2usize, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            threads,
            |b, &threads| {
                let session = Arc::new(SessionLock::new(SessionConfig::default()));
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let session = Arc::clone(&session);
                            thread::spawn(move || {
                                for _ in 0..16 {
                                    let tx = session.transaction(CompletionSignal::new());
                                    nest(&tx, 2).unwrap();
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended_tx,
    bench_nested_depth,
    bench_named_steps,
    bench_contended,
);

criterion_main!(benches);
