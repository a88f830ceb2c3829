mod common;

use std::collections::HashMap;

use proptest::prelude::*;

use curator_dedup::config::{FuzzyConfig, SemanticConfig};
use curator_dedup::document::DocumentRecord;
use curator_dedup::fuzzy::FuzzyMatchEngine;
use curator_dedup::identifier::IdGenerator;
use curator_dedup::semantic::{DistanceMetric, SemanticMatchEngine};
use curator_dedup::util::UnionFind;

fn corpus_strategy() -> impl Strategy<Value = Vec<String>> {
    // A small alphabet makes accidental near-duplicates likely.
    prop::collection::vec("[ab ]{0,40}", 1..30)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn fuzzy_output_is_deterministic(texts in corpus_strategy(), partitions in 1usize..8) {
        let docs: Vec<DocumentRecord> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| DocumentRecord::with_id(i as u64 * 3 + 1, t.clone()))
            .collect();
        let config = FuzzyConfig::default().with_char_ngrams(4).with_bands(8, 3);

        let baseline = FuzzyMatchEngine::new(config.clone()).unwrap().identify(&docs).unwrap();
        let again = FuzzyMatchEngine::new(config.clone()).unwrap().identify(&docs).unwrap();
        let resharded = FuzzyMatchEngine::new(config.with_shuffle_partitions(partitions))
            .unwrap()
            .identify(&docs)
            .unwrap();

        prop_assert_eq!(&baseline, &again);
        prop_assert_eq!(&baseline, &resharded);
        prop_assert!(baseline.iter().all(|id| docs.iter().any(|d| d.id == Some(*id))));
    }

    #[test]
    fn semantic_removal_grows_with_eps(
        vectors in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 3), 2..25),
        low in 0.0f64..0.5,
        extra in 0.0f64..0.5,
    ) {
        let embeddings: HashMap<u64, Vec<f32>> = vectors
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i as u64, v))
            .collect();
        let config = SemanticConfig::default()
            .with_n_clusters(3)
            .with_distance_metric(DistanceMetric::L2);

        let strict = SemanticMatchEngine::new(config.clone().with_eps(low))
            .unwrap()
            .identify(&embeddings)
            .unwrap();
        let loose = SemanticMatchEngine::new(config.with_eps(low + extra))
            .unwrap()
            .identify(&embeddings)
            .unwrap();

        prop_assert!(strict.duplicate_ids.len() <= loose.duplicate_ids.len());
        prop_assert!(loose.duplicate_ids.len() < embeddings.len());
    }

    #[test]
    fn restored_generator_issues_disjoint_ranges(
        counts in prop::collection::vec(0u64..50, 1..20),
        more in prop::collection::vec(0u64..50, 1..10),
    ) {
        let mut generator = IdGenerator::new();
        for (i, count) in counts.iter().enumerate() {
            generator.assign(&format!("old-{i}"), *count, false).unwrap();
        }
        let snapshot = generator.snapshot();

        let mut restored = IdGenerator::restore(snapshot.clone()).unwrap();
        for (i, count) in more.iter().enumerate() {
            let range = restored.assign(&format!("new-{i}"), *count, false).unwrap();
            for old in snapshot.assigned_ranges.values() {
                prop_assert!(!old.overlaps(&range));
            }
        }
    }

    #[test]
    fn union_find_components_partition_members(
        edges in prop::collection::vec((0u64..40, 0u64..40), 0..60),
    ) {
        let mut uf = UnionFind::new();
        for (a, b) in &edges {
            uf.union(*a, *b);
        }
        let components = uf.components(1);
        let total: usize = components.iter().map(Vec::len).sum();
        prop_assert_eq!(total, uf.len());
        for (a, b) in &edges {
            prop_assert!(uf.connected(*a, *b));
        }
    }
}
