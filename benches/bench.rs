//! Criterion benchmarks for the deduplication engines.
//!
//! - MinHash signatures and LSH banding
//! - Fuzzy and exact matching over a synthetic corpus
//! - Semantic matching (k-means plus pairwise distances)

use std::collections::HashMap;
use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use curator_dedup::config::{ExactConfig, FuzzyConfig, SemanticConfig};
use curator_dedup::document::DocumentRecord;
use curator_dedup::exact::ExactMatchEngine;
use curator_dedup::fuzzy::{FuzzyMatchEngine, LshBander, MinHasher, shingle_hashes};
use curator_dedup::semantic::SemanticMatchEngine;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate documents where roughly every tenth one is a light edit of an
/// earlier one.
fn generate_test_documents(count: usize) -> Vec<DocumentRecord> {
    let mut rng = StdRng::seed_from_u64(7);
    let words = [
        "corpus", "duplicate", "shingle", "minhash", "band", "bucket", "cluster", "centroid",
        "record", "partition", "identifier", "snapshot", "removal", "filter", "token", "text",
    ];

    let mut texts: Vec<String> = Vec::with_capacity(count);
    for i in 0..count {
        let text = if i > 0 && i % 10 == 0 {
            let source = &texts[rng.random_range(0..i)];
            format!("{source} edited")
        } else {
            (0..60)
                .map(|_| words[rng.random_range(0..words.len())])
                .collect::<Vec<_>>()
                .join(" ")
        };
        texts.push(text);
    }

    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| DocumentRecord::with_id(i as u64, text))
        .collect()
}

/// Generate random embeddings.
fn generate_test_embeddings(count: usize, dimension: usize) -> HashMap<u64, Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(11);
    (0..count as u64)
        .map(|id| {
            let vector = (0..dimension).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
            (id, vector)
        })
        .collect()
}

/// Benchmark signature computation.
fn bench_minhash(c: &mut Criterion) {
    let mut group = c.benchmark_group("minhash");

    let docs = generate_test_documents(100);
    let hasher = MinHasher::new(260, 42).unwrap();
    let bander = LshBander::new(20, 13).unwrap();
    let shingles = shingle_hashes(&docs[0].text, 24);

    group.bench_function("shingle_single_document", |b| {
        b.iter(|| black_box(shingle_hashes(black_box(&docs[0].text), 24)))
    });

    group.bench_function("signature_and_bands", |b| {
        b.iter(|| {
            let signature = hasher.signature(black_box(&shingles)).unwrap();
            black_box(bander.bucket_keys(&signature).unwrap())
        })
    });

    group.finish();
}

/// Benchmark end-to-end identification.
fn bench_identify(c: &mut Criterion) {
    let mut group = c.benchmark_group("identify");
    group.sample_size(10);

    let docs = generate_test_documents(2000);
    let fuzzy = FuzzyMatchEngine::new(FuzzyConfig::default()).unwrap();
    let exact = ExactMatchEngine::new(ExactConfig::default()).unwrap();

    group.throughput(Throughput::Elements(docs.len() as u64));
    group.bench_function("fuzzy_2000_documents", |b| {
        b.iter(|| black_box(fuzzy.identify(black_box(&docs)).unwrap()))
    });
    group.bench_function("exact_2000_documents", |b| {
        b.iter(|| black_box(exact.identify(black_box(&docs)).unwrap()))
    });

    let embeddings = generate_test_embeddings(2000, 64);
    let semantic =
        SemanticMatchEngine::new(SemanticConfig::default().with_n_clusters(20)).unwrap();
    group.bench_function("semantic_2000_embeddings", |b| {
        b.iter(|| black_box(semantic.identify(black_box(&embeddings)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_minhash, bench_identify);

criterion_main!(benches);
