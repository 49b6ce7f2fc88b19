//! Benchmarks for submit/join round trips and combinator chains

use cascade_rs::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn bench_submit_join(c: &mut Criterion) {
    let pool = TaskPool::with_threads(4).unwrap();

    c.bench_function("submit_join", |b| {
        b.iter(|| pool.submit(|| black_box(21) * 2).join().unwrap());
    });
}

fn bench_map_chain(c: &mut Criterion) {
    let pool = TaskPool::with_threads(4).unwrap();

    c.bench_function("map_x16", |b| {
        b.iter(|| {
            let mut future = pool.submit(|| 0u64);
            for _ in 0..16 {
                future = future.map(|v| black_box(v + 1));
            }
            future.join().unwrap()
        });
    });
}

fn bench_dependent_chain(c: &mut Criterion) {
    let pool = Arc::new(TaskPool::with_threads(4).unwrap());

    c.bench_function("chain_x8", |b| {
        b.iter(|| {
            let mut future = pool.submit(|| 0u64);
            for _ in 0..8 {
                let inner = pool.clone();
                future = future.chain(move |v| inner.submit(move || black_box(v + 1)));
            }
            future.join().unwrap()
        });
    });
}

fn bench_combine_and_all_of(c: &mut Criterion) {
    let pool = TaskPool::with_threads(4).unwrap();

    c.bench_function("combine_pair", |b| {
        b.iter(|| {
            let a = pool.submit(|| black_box(3));
            let b = pool.submit(|| black_box(4));
            a.combine(&b, |a, b| a + b).join().unwrap()
        });
    });

    c.bench_function("all_of_32", |b| {
        b.iter(|| {
            let futures: Vec<_> = (0..32).map(|i| pool.submit(move || black_box(i))).collect();
            let views: Vec<&dyn Completion> = futures.iter().map(|f| f as &dyn Completion).collect();
            pool.all_of(&views).join().unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_submit_join,
    bench_map_chain,
    bench_dependent_chain,
    bench_combine_and_all_of
);
criterion_main!(benches);
