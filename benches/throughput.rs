//! Throughput benchmarks for petek cells

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use petek::{ComparableCell, ValueCell, pin};
use std::sync::Arc;
use std::thread;

fn bench_pin_unpin(c: &mut Criterion) {
    let mut group = c.benchmark_group("pin_unpin");

    group.bench_function("single_thread", |b| {
        b.iter(|| {
            let guard = pin();
            black_box(&guard);
        });
    });

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    let cell = Arc::new(ValueCell::with_value(42u64));

    group.bench_function("single_thread", |b| {
        b.iter(|| {
            black_box(cell.load());
        });
    });

    for threads in [2, 4, 8].iter() {
        group.throughput(Throughput::Elements(1000 * *threads as u64));
        group.bench_with_input(
            BenchmarkId::new("concurrent", threads),
            threads,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let cell = cell.clone();
                            thread::spawn(move || {
                                for _ in 0..1000 {
                                    black_box(cell.load());
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

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    for threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(1000 * *threads as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            threads,
            |b, &num_threads| {
                b.iter(|| {
                    let cell = Arc::new(ValueCell::with_value(0u64));
                    let handles: Vec<_> = (0..num_threads)
                        .map(|tid| {
                            let cell = cell.clone();
                            thread::spawn(move || {
                                for i in 0..1000u64 {
                                    cell.store(tid as u64 * 1000 + i);
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

fn bench_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("swap");

    for threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(1000 * *threads as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            threads,
            |b, &num_threads| {
                b.iter(|| {
                    let cell = Arc::new(ValueCell::with_value(0u64));
                    let handles: Vec<_> = (0..num_threads)
                        .map(|tid| {
                            let cell = cell.clone();
                            thread::spawn(move || {
                                for i in 0..1000u64 {
                                    black_box(cell.swap(tid as u64 * 1000 + i));
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

fn bench_compare_and_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_and_swap");
    group.sample_size(20); // Reduce sample size for long-running benchmarks

    group.bench_function("uncontended_hit", |b| {
        let cell = ComparableCell::with_value(0u64);
        let mut next = 0u64;
        b.iter(|| {
            assert!(cell.compare_and_swap(&next, next + 1));
            next += 1;
        });
    });

    group.bench_function("uncontended_miss", |b| {
        let cell = ComparableCell::with_value(0u64);
        b.iter(|| {
            black_box(cell.compare_and_swap(&u64::MAX, 1));
        });
    });

    for threads in [2, 4].iter() {
        group.throughput(Throughput::Elements(1000 * *threads as u64));
        group.bench_with_input(
            BenchmarkId::new("contended_counter", threads),
            threads,
            |b, &num_threads| {
                b.iter(|| {
                    let cell = Arc::new(ComparableCell::with_value(0u64));
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let cell = cell.clone();
                            thread::spawn(move || {
                                for _ in 0..1000 {
                                    loop {
                                        let current = cell.load();
                                        if cell.compare_and_swap(&current, current + 1) {
                                            break;
                                        }
                                    }
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
    bench_pin_unpin,
    bench_load,
    bench_store,
    bench_swap,
    bench_compare_and_swap
);
criterion_main!(benches);
