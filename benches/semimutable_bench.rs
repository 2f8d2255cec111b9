//! Benchmark for Semimutable and SoftLock.
//!
//! Measures the cost of writes before the freeze, the freeze itself, and
//! reads once frozen, against `OnceLock` and `LazyLock` as baselines.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use semimutable::{Semimutable, SoftLock};
use std::hint::black_box;
use std::sync::{Arc, LazyLock, OnceLock};
use std::thread;

// =============================================================================
// SoftLock Benchmarks
// =============================================================================

fn benchmark_soft_lock(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("soft_lock");

    let lock = SoftLock::new();
    group.bench_function("acquire_release", |bencher| {
        bencher.iter(|| {
            let acquired = lock.try_acquire();
            lock.release();
            black_box(acquired)
        });
    });

    let held = SoftLock::new();
    held.try_acquire();
    group.bench_function("contended_try_acquire", |bencher| {
        bencher.iter(|| black_box(held.try_acquire()));
    });

    group.finish();
}

// =============================================================================
// Write Benchmarks
// =============================================================================

fn benchmark_unlocked_writes(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("semimutable_unlocked_writes");

    let value = Semimutable::with_value(0_u64);
    group.bench_function("set_value", |bencher| {
        bencher.iter(|| black_box(value.set_value(black_box(42))));
    });

    group.bench_function("set_with", |bencher| {
        bencher.iter(|| black_box(value.set_with(|| 42)));
    });

    group.bench_function("reset_value", |bencher| {
        bencher.iter(|| black_box(value.reset_value()));
    });

    group.finish();
}

fn benchmark_rejected_writes(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("semimutable_rejected_writes");

    let value = Semimutable::with_value(0_u64);
    value.lock_value();
    group.bench_function("set_value_after_freeze", |bencher| {
        bencher.iter(|| black_box(value.set_value(black_box(42))));
    });

    group.finish();
}

// =============================================================================
// Freeze Benchmarks
// =============================================================================

fn benchmark_first_read(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("semimutable_first_read");

    group.bench_function("Semimutable", |bencher| {
        bencher.iter(|| {
            let value = Semimutable::new(|| {
                let mut sum = 0_u64;
                for index in 0..100 {
                    sum += index;
                }
                sum
            });
            black_box(*value.value())
        });
    });

    group.bench_function("OnceLock", |bencher| {
        bencher.iter(|| {
            let cell = OnceLock::new();
            let value = cell.get_or_init(|| {
                let mut sum = 0_u64;
                for index in 0..100 {
                    sum += index;
                }
                sum
            });
            black_box(*value)
        });
    });

    group.finish();
}

fn benchmark_freeze_contention(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("semimutable_freeze_contention");

    for thread_count in [2, 4, 8, 16] {
        group.bench_with_input(
            BenchmarkId::new("thread_count", thread_count),
            &thread_count,
            |bencher, &thread_count| {
                bencher.iter(|| {
                    let value = Arc::new(Semimutable::with_value(7_u64));

                    let handles: Vec<_> = (0..thread_count)
                        .map(|index| {
                            let value = Arc::clone(&value);
                            thread::spawn(move || {
                                if index % 2 == 0 {
                                    let _ = value.set_value(index);
                                }
                                *value.value()
                            })
                        })
                        .collect();

                    for handle in handles {
                        black_box(handle.join().unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Frozen Read Benchmarks
// =============================================================================

static LAZY_BASELINE: LazyLock<u64> = LazyLock::new(|| 42);

fn benchmark_frozen_read(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("semimutable_frozen_read");

    let value = Semimutable::with_value(42_u64);
    let _ = value.value();
    group.bench_function("Semimutable", |bencher| {
        bencher.iter(|| black_box(*value.value()));
    });

    let cell = OnceLock::new();
    let _ = cell.get_or_init(|| 42_u64);
    group.bench_function("OnceLock", |bencher| {
        bencher.iter(|| black_box(*cell.get_or_init(|| 0)));
    });

    group.bench_function("LazyLock", |bencher| {
        bencher.iter(|| black_box(*LazyLock::force(&LAZY_BASELINE)));
    });

    group.finish();
}

fn benchmark_frozen_read_threads(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("semimutable_frozen_read_threads");

    for thread_count in [2, 4, 8, 16] {
        group.bench_with_input(
            BenchmarkId::new("thread_count", thread_count),
            &thread_count,
            |bencher, &thread_count| {
                let value = Arc::new(Semimutable::with_value(42_u64));
                let _ = value.value();

                bencher.iter(|| {
                    let handles: Vec<_> = (0..thread_count)
                        .map(|_| {
                            let value = Arc::clone(&value);
                            thread::spawn(move || {
                                let mut sum = 0_u64;
                                for _ in 0..1000 {
                                    sum += *value.value();
                                }
                                sum
                            })
                        })
                        .collect();

                    for handle in handles {
                        black_box(handle.join().unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Criterion Group and Main
// =============================================================================

criterion_group!(
    benches,
    benchmark_soft_lock,
    benchmark_unlocked_writes,
    benchmark_rejected_writes,
    benchmark_first_read,
    benchmark_freeze_contention,
    benchmark_frozen_read,
    benchmark_frozen_read_threads
);

criterion_main!(benches);
