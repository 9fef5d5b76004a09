#[macro_use]
extern crate criterion;

use criterion::Criterion;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use interval_index::{IntervalStore, RangeInterval, StoreKind};

/// Generate `n` random intervals of max length `max_len` scattered over `[0, width)`.
fn make_random_intervals(n: usize, width: i32, max_len: i32, seed: u64) -> Vec<RangeInterval<u32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let begin = rng.gen_range(0..width);
            let len = rng.gen_range(0..=max_len);
            let end = (begin + len).min(width - 1).max(begin);
            RangeInterval::new(begin, end, i as u32)
        })
        .collect()
}

fn query_store(store: &mut IntervalStore<RangeInterval<u32>>, queries: &[(i32, i32)]) -> usize {
    let mut total = 0;
    for &(from, to) in queries {
        total += store.find_overlaps(from, to).len();
    }
    total
}

fn bench_engines(c: &mut Criterion) {
    let data = make_random_intervals(10_000, 1_000_000, 50, 42);
    let queries: Vec<(i32, i32)> = (0..1_000_000)
        .step_by(1_000)
        .map(|s| (s, s + 1_000))
        .collect();

    let nested = IntervalStore::from_iter_with(StoreKind::NCList, Default::default(), data.clone());
    let flat = IntervalStore::from_iter_with(StoreKind::FlatNest, Default::default(), data);

    let mut group = c.benchmark_group("find_overlaps");
    group.bench_function("nclist", |b| {
        let mut nested = nested.clone();
        b.iter(|| query_store(&mut nested, &queries))
    });
    group.bench_function("flat_nest", |b| {
        let mut flat = flat.clone();
        b.iter(|| query_store(&mut flat, &queries))
    });
    group.finish();
}

fn bench_incremental_add(c: &mut Criterion) {
    let data = make_random_intervals(5_000, 500_000, 50, 7);

    c.bench_function("nclist_incremental_add", |b| {
        b.iter(|| {
            let mut store = IntervalStore::new(StoreKind::NCList);
            for iv in &data {
                store.add(iv.clone());
            }
            store.size()
        })
    });

    c.bench_function("flat_nest_incremental_add", |b| {
        b.iter(|| {
            let mut store = IntervalStore::new(StoreKind::FlatNest);
            for iv in &data {
                store.add(iv.clone());
            }
            store.revalidate();
            store.size()
        })
    });
}

criterion_group!(benches, bench_engines, bench_incremental_add);
criterion_main!(benches);
