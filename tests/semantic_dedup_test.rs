mod common;

use std::collections::{BTreeSet, HashMap};

use curator_dedup::config::{RemovalConfig, SemanticConfig};
use curator_dedup::document::{CorpusPartition, DocumentRecord};
use curator_dedup::error::Result;
use curator_dedup::removal::RemovalEngine;
use curator_dedup::semantic::{DistanceMetric, KeepPolicy, SemanticMatchEngine, normalize};

fn unit(mut v: Vec<f32>) -> Vec<f32> {
    normalize(&mut v);
    v
}

/// a and b are near-parallel; c and d are orthogonal to both.
fn four_vectors() -> HashMap<u64, Vec<f32>> {
    HashMap::from([
        (1, vec![1.0, 0.0, 0.0]),
        (2, unit(vec![1.0, 0.1, 0.0])),
        (3, vec![0.0, 1.0, 0.0]),
        (4, vec![0.0, 0.0, 1.0]),
    ])
}

fn one_cluster(policy: KeepPolicy) -> SemanticConfig {
    SemanticConfig::default()
        .with_n_clusters(1)
        .with_eps(0.01)
        .with_keep_policy(policy)
}

#[test]
fn test_hard_keeps_member_closest_to_centroid() -> Result<()> {
    common::init_logging();
    let engine = SemanticMatchEngine::new(one_cluster(KeepPolicy::Hard))?;
    let result = engine.identify(&four_vectors())?;

    // b leans toward c, which pulls it closer to the shared centroid than a.
    assert_eq!(result.duplicate_ids, BTreeSet::from([1]));
    assert_eq!(result.kept, BTreeSet::from([2]));
    assert_eq!(result.clusters[0].size, 4);
    Ok(())
}

#[test]
fn test_easy_keeps_member_farthest_from_centroid() -> Result<()> {
    let engine = SemanticMatchEngine::new(one_cluster(KeepPolicy::Easy))?;
    let result = engine.identify(&four_vectors())?;
    assert_eq!(result.duplicate_ids, BTreeSet::from([2]));
    Ok(())
}

#[test]
fn test_random_policy_is_reproducible() -> Result<()> {
    let engine = SemanticMatchEngine::new(one_cluster(KeepPolicy::Random))?;
    let first = engine.identify(&four_vectors())?;
    let second = engine.identify(&four_vectors())?;
    assert_eq!(first.duplicate_ids, second.duplicate_ids);
    assert_eq!(first.duplicate_ids.len(), 1);
    assert!(first.duplicate_ids.is_subset(&BTreeSet::from([1, 2])));
    Ok(())
}

#[test]
fn test_l2_metric_and_many_clusters() -> Result<()> {
    // Three tight groups far apart; each keeps one member.
    let mut embeddings = HashMap::new();
    for group in 0..3u64 {
        for member in 0..4u64 {
            let base = group as f32 * 100.0;
            embeddings.insert(group * 10 + member, vec![base + member as f32 * 0.001, base]);
        }
    }

    let config = SemanticConfig::default()
        .with_n_clusters(3)
        .with_eps(0.1)
        .with_distance_metric(DistanceMetric::L2)
        .with_pairwise_batch_size(3);
    let result = SemanticMatchEngine::new(config)?.identify(&embeddings)?;

    assert_eq!(result.duplicate_ids.len(), 9);
    assert_eq!(result.kept.len(), 3);
    assert!(result.duplicate_ids.iter().all(|id| embeddings.contains_key(id)));
    Ok(())
}

#[test]
fn test_identify_and_remove() -> Result<()> {
    let corpus = vec![CorpusPartition::new(
        "p",
        (1..=4).map(|id| DocumentRecord::with_id(id, format!("doc {id}"))).collect(),
    )];
    let engine = SemanticMatchEngine::new(one_cluster(KeepPolicy::Hard))?;
    let removal = RemovalEngine::new(RemovalConfig::default());
    let (result, filtered) = engine.identify_and_remove(corpus, &four_vectors(), &removal)?;

    assert_eq!(result.duplicate_ids, BTreeSet::from([1]));
    assert_eq!(filtered[0].ids().collect::<Vec<_>>(), vec![2, 3, 4]);
    Ok(())
}
