use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scalaria::{Compression, DynamicArray, ScalarCollection, ScalarMap, Settings, SplitArray};

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("N x add");

    for n in [100usize, 1000, 10000, 100000].iter() {
        group.bench_with_input(BenchmarkId::new("DynamicArray<i64>", n), n, |b, &n| {
            b.iter(|| {
                let mut v = DynamicArray::<i64>::named("bench");
                for i in 0..n {
                    v.add(black_box(i as i64));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("SplitArray<i64>", n), n, |b, &n| {
            b.iter(|| {
                let mut v = SplitArray::<i64>::new(Settings::new("bench"), 4096);
                for i in 0..n {
                    v.add(black_box(i as i64));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("Standard<i64>", n), n, |b, &n| {
            b.iter(|| {
                let mut v = Vec::new();
                for i in 0..n {
                    v.push(black_box(i as i64));
                }
            })
        });
    }

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("N x get");

    for n in [100usize, 1000, 10000, 100000].iter() {
        group.bench_with_input(BenchmarkId::new("ScalarMap<i64, i32>", n), n, |b, &n| {
            let mut m = ScalarMap::<i64, i32>::named("bench");
            for i in 0..n {
                m.put(i as i64, i as i32);
            }

            b.iter(|| {
                for i in 0..n {
                    black_box(m.get(&black_box(i as i64)));
                }
            })
        });

        group.bench_with_input(
            BenchmarkId::new("ScalarMap<i64, i32> (frozen)", n),
            n,
            |b, &n| {
                let mut m = ScalarMap::<i64, i32>::named("bench");
                for i in 0..n {
                    m.put(i as i64, i as i32);
                }
                m.compress(Compression::Freeze);

                b.iter(|| {
                    for i in 0..n {
                        black_box(m.get(&black_box(i as i64)));
                    }
                })
            },
        );

        group.bench_with_input(BenchmarkId::new("Standard<i64, i32>", n), n, |b, &n| {
            let mut m = HashMap::new();
            for i in 0..n {
                m.insert(i as i64, i as i32);
            }

            b.iter(|| {
                for i in 0..n {
                    black_box(m.get(&black_box(i as i64)));
                }
            })
        });
    }

    group.finish();
}

fn bench_combination(c: &mut Criterion) {
    let mut group = c.benchmark_group("N x put -> N/2 x remove -> N/2 x put");

    for n in [100usize, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("ScalarMap<i64, i32>", n), n, |b, &n| {
            b.iter(|| {
                let mut m = ScalarMap::<i64, i32>::named("bench");

                for i in 0..n {
                    m.put(black_box(i as i64), 1);
                }

                for i in 0..(n / 2) {
                    m.remove(&black_box(2 * i as i64));
                }

                for i in 0..(n / 2) {
                    m.put(black_box((n + i) as i64), 2);
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("Standard<i64, i32>", n), n, |b, &n| {
            b.iter(|| {
                let mut m = HashMap::new();

                for i in 0..n {
                    m.insert(black_box(i as i64), 1);
                }

                for i in 0..(n / 2) {
                    m.remove(&black_box(2 * i as i64));
                }

                for i in 0..(n / 2) {
                    m.insert(black_box((n + i) as i64), 2);
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_add, bench_get, bench_combination);
criterion_main!(benches);
