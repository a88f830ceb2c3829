//! The fuzzy matching engine.

use std::collections::BTreeSet;

use ahash::AHashMap;
use log::{debug, info};
use rayon::prelude::*;
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::Identifier;
use crate::config::FuzzyConfig;
use crate::document::DocumentRecord;
use crate::error::{DedupError, Result};
use crate::fuzzy::lsh::LshBander;
use crate::fuzzy::minhash::MinHasher;
use crate::fuzzy::shingle::{jaccard, shingle_hashes};
use crate::util::{CancellationToken, UnionFind};

/// One bucket membership emitted by the banding stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct BucketEntry {
    band: u32,
    key: u64,
    id: Identifier,
}

struct SignedDocument {
    id: Identifier,
    keys: Vec<u64>,
    shingles: Option<Vec<u64>>,
}

/// A connected component of near-duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyCluster {
    /// The identifier that survives (lowest member).
    pub kept: Identifier,
    /// All members, ascending, including `kept`.
    pub members: Vec<Identifier>,
}

impl FuzzyCluster {
    /// Members marked for removal.
    pub fn removed(&self) -> &[Identifier] {
        &self.members[1..]
    }
}

/// Counters gathered during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuzzyStats {
    /// Documents seen.
    pub documents: usize,
    /// Documents long enough to produce shingles.
    pub signed_documents: usize,
    /// Buckets with two or more members.
    pub shared_buckets: usize,
    /// Edges handed to the merge stage.
    pub edges: usize,
    /// Candidate pairs rejected by the Jaccard check.
    pub false_positives: usize,
}

/// Result of [`FuzzyMatchEngine::identify_detailed`].
#[derive(Debug, Clone, Default)]
pub struct FuzzyResult {
    /// Identifiers to remove.
    pub duplicate_ids: BTreeSet<Identifier>,
    /// Connected components, ordered by kept identifier.
    pub clusters: Vec<FuzzyCluster>,
    /// Run counters.
    pub stats: FuzzyStats,
}

/// Output of one shuffle partition.
#[derive(Default)]
struct PartitionOutput {
    edges: Vec<(Identifier, Identifier)>,
    shared_buckets: usize,
    false_positives: usize,
}

/// MinHash/LSH near-duplicate detector.
///
/// ```
/// use curator_dedup::config::FuzzyConfig;
/// use curator_dedup::document::DocumentRecord;
/// use curator_dedup::fuzzy::FuzzyMatchEngine;
///
/// let config = FuzzyConfig::default().with_char_ngrams(5).with_bands(16, 4);
/// let engine = FuzzyMatchEngine::new(config).unwrap();
/// let docs = vec![
///     DocumentRecord::with_id(1, "the cat sat on the mat today"),
///     DocumentRecord::with_id(2, "the cat sat on the mat today"),
///     DocumentRecord::with_id(3, "completely unrelated words here"),
/// ];
/// let removed = engine.identify(&docs).unwrap();
/// assert_eq!(removed.into_iter().collect::<Vec<_>>(), vec![2]);
/// ```
#[derive(Debug, Clone)]
pub struct FuzzyMatchEngine {
    config: FuzzyConfig,
    hasher: MinHasher,
    bander: LshBander,
    cancel: Option<CancellationToken>,
}

impl FuzzyMatchEngine {
    /// Create a new engine.
    pub fn new(config: FuzzyConfig) -> Result<Self> {
        config.validate()?;
        let hasher = MinHasher::new(config.signature_length(), config.seed)?;
        let bander = LshBander::new(config.num_bands, config.minhashes_per_band)?;
        Ok(FuzzyMatchEngine {
            config,
            hasher,
            bander,
            cancel: None,
        })
    }

    /// Observe `token` between stages and shuffle partitions.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The engine's configuration.
    pub fn config(&self) -> &FuzzyConfig {
        &self.config
    }

    fn check_cancelled(&self, stage: &str) -> Result<()> {
        match &self.cancel {
            Some(token) => token.check(stage),
            None => Ok(()),
        }
    }

    fn sign(&self, documents: &[DocumentRecord]) -> Result<Vec<SignedDocument>> {
        let field = self.config.text_field.as_str();
        let keep_shingles = self.config.jaccard_threshold.is_some();

        let signed: Vec<Option<SignedDocument>> = documents
            .par_iter()
            .enumerate()
            .map(|(position, doc)| -> Result<Option<SignedDocument>> {
                let id = doc.id.ok_or(DedupError::MissingIdentifier { position })?;
                let text = doc.text_for(field).ok_or_else(|| {
                    DedupError::invalid_config(format!(
                        "document {id} has no text field '{field}'"
                    ))
                })?;

                let shingles = shingle_hashes(text, self.config.char_ngrams);
                let Some(signature) = self.hasher.signature(&shingles) else {
                    return Ok(None);
                };
                let keys = self.bander.bucket_keys(&signature)?;
                Ok(Some(SignedDocument {
                    id,
                    keys,
                    shingles: keep_shingles.then_some(shingles),
                }))
            })
            .collect::<Result<_>>()?;

        Ok(signed.into_iter().flatten().collect())
    }

    fn shuffle(&self, signed: &[SignedDocument]) -> Vec<Vec<BucketEntry>> {
        let partitions = self.config.shuffle_partitions;
        let mut shards: Vec<Vec<BucketEntry>> = vec![Vec::new(); partitions];

        for doc in signed {
            for (band, &key) in doc.keys.iter().enumerate() {
                let route = xxh3_64_with_seed(&key.to_le_bytes(), band as u64);
                shards[(route % partitions as u64) as usize].push(BucketEntry {
                    band: band as u32,
                    key,
                    id: doc.id,
                });
            }
        }
        shards
    }

    /// Link every bucket of one shard to its lowest member and reduce the
    /// links with a local union-find.
    fn reduce_partition(
        &self,
        mut entries: Vec<BucketEntry>,
        shingles: &AHashMap<Identifier, &[u64]>,
    ) -> Result<PartitionOutput> {
        self.check_cancelled("fuzzy bucket grouping")?;

        entries.sort_unstable();
        let mut output = PartitionOutput::default();
        let mut local = UnionFind::new();

        for bucket in entries.chunk_by(|a, b| a.band == b.band && a.key == b.key) {
            if bucket.len() < 2 {
                continue;
            }
            output.shared_buckets += 1;

            let anchor = bucket[0].id;
            for member in bucket[1..].iter().map(|e| e.id) {
                if member == anchor {
                    continue;
                }
                if let Some(threshold) = self.config.jaccard_threshold {
                    let similarity = match (shingles.get(&anchor), shingles.get(&member)) {
                        (Some(a), Some(b)) => jaccard(a, b),
                        _ => 0.0,
                    };
                    if similarity < threshold {
                        output.false_positives += 1;
                        continue;
                    }
                }
                local.union(anchor, member);
            }
        }

        output.edges = local.into_edges();
        Ok(output)
    }

    /// Connected components of near-duplicate documents, ordered by kept
    /// identifier, together with run counters.
    pub fn identify_detailed(&self, documents: &[DocumentRecord]) -> Result<FuzzyResult> {
        let mut stats = FuzzyStats {
            documents: documents.len(),
            ..Default::default()
        };

        let signed = self.sign(documents)?;
        stats.signed_documents = signed.len();
        self.check_cancelled("fuzzy signatures")?;
        debug!(
            "fuzzy: {} of {} documents signed ({} bands x {} rows)",
            signed.len(),
            documents.len(),
            self.bander.num_bands(),
            self.bander.rows_per_band()
        );

        let shingles: AHashMap<Identifier, &[u64]> = signed
            .iter()
            .filter_map(|doc| doc.shingles.as_deref().map(|s| (doc.id, s)))
            .collect();

        let outputs: Vec<PartitionOutput> = self
            .shuffle(&signed)
            .into_par_iter()
            .map(|entries| self.reduce_partition(entries, &shingles))
            .collect::<Result<_>>()?;

        // Global merge: every shard has finished before any edge is applied.
        let mut global = UnionFind::with_capacity(signed.len());
        for output in outputs {
            stats.shared_buckets += output.shared_buckets;
            stats.false_positives += output.false_positives;
            stats.edges += output.edges.len();
            for (member, root) in output.edges {
                global.union(member, root);
            }
        }
        self.check_cancelled("fuzzy merge")?;

        let clusters: Vec<FuzzyCluster> = global
            .components(2)
            .into_iter()
            .map(|members| FuzzyCluster {
                kept: members[0],
                members,
            })
            .collect();
        let duplicate_ids: BTreeSet<Identifier> = clusters
            .iter()
            .flat_map(|c| c.removed().iter().copied())
            .collect();

        info!(
            "fuzzy match: {} documents, {} clusters, {} to remove ({} false positives dropped)",
            stats.documents,
            clusters.len(),
            duplicate_ids.len(),
            stats.false_positives
        );

        Ok(FuzzyResult {
            duplicate_ids,
            clusters,
            stats,
        })
    }

    /// Connected components of near-duplicate documents.
    pub fn identify_clusters(&self, documents: &[DocumentRecord]) -> Result<Vec<FuzzyCluster>> {
        Ok(self.identify_detailed(documents)?.clusters)
    }

    /// Identifiers to remove.
    pub fn identify(&self, documents: &[DocumentRecord]) -> Result<BTreeSet<Identifier>> {
        Ok(self.identify_detailed(documents)?.duplicate_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> FuzzyConfig {
        FuzzyConfig::default()
            .with_char_ngrams(5)
            .with_bands(16, 4)
            .with_shuffle_partitions(4)
    }

    #[test]
    fn test_identical_texts_cluster() {
        let engine = FuzzyMatchEngine::new(small_config()).unwrap();
        let docs = vec![
            DocumentRecord::with_id(5, "a repeated sentence about deduplication"),
            DocumentRecord::with_id(2, "a repeated sentence about deduplication"),
            DocumentRecord::with_id(9, "a repeated sentence about deduplication"),
            DocumentRecord::with_id(1, "nothing in common with the others!"),
        ];
        let clusters = engine.identify_clusters(&docs).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].kept, 2);
        assert_eq!(clusters[0].members, vec![2, 5, 9]);
        assert_eq!(engine.identify(&docs).unwrap(), BTreeSet::from([5, 9]));
    }

    #[test]
    fn test_short_texts_never_match() {
        let engine = FuzzyMatchEngine::new(FuzzyConfig::default()).unwrap();
        let docs = vec![
            DocumentRecord::with_id(1, "tiny"),
            DocumentRecord::with_id(2, "tiny"),
        ];
        let result = engine.identify_detailed(&docs).unwrap();
        assert!(result.duplicate_ids.is_empty());
        assert_eq!(result.stats.signed_documents, 0);
    }

    #[test]
    fn test_partition_count_does_not_change_result() {
        let docs: Vec<DocumentRecord> = (0..40)
            .map(|i| {
                DocumentRecord::with_id(i, format!("shared prefix for all documents, variant {}", i % 7))
            })
            .collect();

        let one = FuzzyMatchEngine::new(small_config().with_shuffle_partitions(1)).unwrap();
        let many = FuzzyMatchEngine::new(small_config().with_shuffle_partitions(13)).unwrap();
        assert_eq!(
            one.identify_clusters(&docs).unwrap(),
            many.identify_clusters(&docs).unwrap()
        );
    }

    #[test]
    fn test_jaccard_threshold_keeps_true_duplicates() {
        let docs = vec![
            DocumentRecord::with_id(1, "abcdefghij"),
            DocumentRecord::with_id(2, "abcdefghij"),
        ];
        let strict = FuzzyMatchEngine::new(small_config().with_jaccard_threshold(1.0)).unwrap();
        assert_eq!(strict.identify(&docs).unwrap(), BTreeSet::from([2]));
    }

    #[test]
    fn test_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let engine = FuzzyMatchEngine::new(small_config())
            .unwrap()
            .with_cancellation(token);
        let docs = vec![DocumentRecord::with_id(1, "some text long enough")];
        assert!(matches!(
            engine.identify(&docs),
            Err(DedupError::OperationCancelled(_))
        ));
    }

    #[test]
    fn test_missing_identifier() {
        let engine = FuzzyMatchEngine::new(small_config()).unwrap();
        let docs = vec![DocumentRecord::new("no identifier here")];
        assert!(matches!(
            engine.identify(&docs),
            Err(DedupError::MissingIdentifier { position: 0 })
        ));
    }
}
