use criterion::{Criterion, criterion_group, criterion_main};
use graph_rag::index::{LocalIndex, VectorIndex, VectorRecord, cosine_similarity};
use std::hint::black_box;

const DIMENSION: usize = 384;
const RECORDS: usize = 5_000;

fn pseudo_vector(seed: usize) -> Vec<f32> {
    (0..DIMENSION)
        .map(|i| ((seed * 31 + i * 17) % 97) as f32 / 97.0 - 0.5)
        .collect()
}

fn populated_index(runtime: &tokio::runtime::Runtime) -> LocalIndex {
    let index = LocalIndex::new("bench", DIMENSION);
    let records = (0..RECORDS)
        .map(|i| VectorRecord::new(format!("graph_{i}"), pseudo_vector(i), format!("Node: n{i}")))
        .collect();
    runtime
        .block_on(index.upsert(records))
        .expect("upsert should succeed");
    index
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime should start");
    let index = populated_index(&runtime);
    let query = pseudo_vector(RECORDS + 1);

    c.bench_function("cosine_similarity", |b| {
        let other = pseudo_vector(7);
        b.iter(|| cosine_similarity(black_box(&query), black_box(&other)));
    });

    c.bench_function("local_search_top5", |b| {
        b.iter(|| runtime.block_on(index.search(black_box(&query), 5)));
    });

    c.bench_function("local_search_top100", |b| {
        b.iter(|| runtime.block_on(index.search(black_box(&query), 100)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
