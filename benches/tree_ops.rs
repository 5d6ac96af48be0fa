// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Benchmark: compact-btree vs std::collections::BTreeMap
//!
//! Run with: cargo bench --bench tree_ops
//!
//! Covers the hot paths: sequential and shuffled insertion, point lookup,
//! full iteration and erase. Key material is generated once per batch so
//! both containers see identical workloads.

use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{seq::SliceRandom, SeedableRng};
use std::hint::black_box;

use compact_btree::BTreeMap;

const KEY_COUNT: i64 = 10_000;

fn sequential_keys() -> Vec<i64> {
    (0..KEY_COUNT).collect()
}

fn shuffled_keys() -> Vec<i64> {
    let mut keys = sequential_keys();
    let mut rng = StdRng::seed_from_u64(42);
    keys.shuffle(&mut rng);
    keys
}

fn setup_compact(keys: &[i64]) -> BTreeMap<i64, i64> {
    let mut map = BTreeMap::new();
    for &k in keys {
        map.insert(k, k * 2);
    }
    map
}

fn setup_std(keys: &[i64]) -> std::collections::BTreeMap<i64, i64> {
    let mut map = std::collections::BTreeMap::new();
    for &k in keys {
        map.insert(k, k * 2);
    }
    map
}

fn bench_insert(c: &mut Criterion) {
    let sequential = sequential_keys();
    let shuffled = shuffled_keys();

    let mut group = c.benchmark_group("insert");
    group.bench_function("compact_sequential", |b| {
        b.iter(|| black_box(setup_compact(&sequential)))
    });
    group.bench_function("std_sequential", |b| {
        b.iter(|| black_box(setup_std(&sequential)))
    });
    group.bench_function("compact_shuffled", |b| {
        b.iter(|| black_box(setup_compact(&shuffled)))
    });
    group.bench_function("std_shuffled", |b| {
        b.iter(|| black_box(setup_std(&shuffled)))
    });
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let shuffled = shuffled_keys();
    let compact = setup_compact(&shuffled);
    let std_map = setup_std(&shuffled);

    let mut group = c.benchmark_group("lookup");
    group.bench_function("compact", |b| {
        b.iter(|| {
            for k in &shuffled {
                black_box(compact.get(k));
            }
        })
    });
    group.bench_function("std", |b| {
        b.iter(|| {
            for k in &shuffled {
                black_box(std_map.get(k));
            }
        })
    });
    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let shuffled = shuffled_keys();
    let compact = setup_compact(&shuffled);
    let std_map = setup_std(&shuffled);

    let mut group = c.benchmark_group("iterate");
    group.bench_function("compact", |b| {
        b.iter(|| {
            let mut sum = 0i64;
            for (_, v) in compact.iter() {
                sum += v;
            }
            black_box(sum)
        })
    });
    group.bench_function("std", |b| {
        b.iter(|| {
            let mut sum = 0i64;
            for (_, v) in std_map.iter() {
                sum += v;
            }
            black_box(sum)
        })
    });
    group.finish();
}

fn bench_erase(c: &mut Criterion) {
    let shuffled = shuffled_keys();

    let mut group = c.benchmark_group("erase");
    group.bench_function("compact", |b| {
        b.iter_batched(
            || setup_compact(&shuffled),
            |mut map| {
                for k in &shuffled {
                    black_box(map.remove(k));
                }
            },
            criterion::BatchSize::LargeInput,
        )
    });
    group.bench_function("std", |b| {
        b.iter_batched(
            || setup_std(&shuffled),
            |mut map| {
                for k in &shuffled {
                    black_box(map.remove(k));
                }
            },
            criterion::BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup, bench_iterate, bench_erase);
criterion_main!(benches);
