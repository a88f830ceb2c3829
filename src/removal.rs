//! Applying a duplicate-ID set back onto the corpus.
//!
//! Every partition is streamed once. Record identifiers come either from the
//! records themselves or, for records read without one, from the identifier
//! snapshot by `(partition key, position)`. The snapshot only resolves
//! correctly if the corpus is partitioned and ordered exactly as it was when
//! identifiers were assigned; any detectable drift is an error rather than a
//! silent wrong removal.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::Identifier;
use crate::config::RemovalConfig;
use crate::document::{CorpusPartition, records_to_jsonl};
use crate::error::{DedupError, Result};
use crate::identifier::IdentifierState;
use crate::storage::{self, Storage};

/// Number of unresolved identifiers quoted in the error.
const UNRESOLVED_SAMPLE: usize = 10;

/// Counters of one removal run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalStats {
    /// Partitions streamed.
    pub partitions: usize,
    /// Records read.
    pub records_in: usize,
    /// Records kept.
    pub records_out: usize,
    /// Records dropped.
    pub records_removed: usize,
    /// Duplicate identifiers that matched no record.
    pub unresolved: usize,
}

/// Filters a corpus by a duplicate-ID set.
#[derive(Debug, Clone, Default)]
pub struct RemovalEngine {
    config: RemovalConfig,
    state: Option<IdentifierState>,
}

impl RemovalEngine {
    /// Create an engine that relies on identifiers carried by the records.
    pub fn new(config: RemovalConfig) -> Self {
        RemovalEngine {
            config,
            state: None,
        }
    }

    /// Resolve records without an identifier through `state`, and verify
    /// records with one against it.
    pub fn with_state(mut self, state: IdentifierState) -> Self {
        self.state = Some(state);
        self
    }

    /// The engine's configuration.
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Identifier of every record of `partition`, in order.
    fn resolve_partition(&self, partition: &CorpusPartition) -> Result<Vec<Identifier>> {
        let needs_state = partition.records.iter().any(|r| r.id.is_none());
        let range = match &self.state {
            Some(state) => state.range(&partition.key),
            None if needs_state => {
                return Err(DedupError::MissingSnapshot(format!(
                    "partition '{}' has records without identifiers and no identifier snapshot was supplied",
                    partition.key
                )));
            }
            None => None,
        };

        let Some(range) = range else {
            if needs_state {
                return Err(DedupError::partition_mismatch(
                    partition.key.clone(),
                    "no identifier range was assigned",
                ));
            }
            return Ok(partition.ids().collect());
        };

        if range.len() != partition.len() as u64 {
            return Err(DedupError::partition_mismatch(
                partition.key.clone(),
                format!(
                    "{} records, but {} identifiers were assigned",
                    partition.len(),
                    range.len()
                ),
            ));
        }

        partition
            .records
            .iter()
            .enumerate()
            .map(|(position, record)| {
                let expected = range.start + position as u64;
                match record.id {
                    Some(id) if id != expected => Err(DedupError::partition_mismatch(
                        partition.key.clone(),
                        format!("record {position} has identifier {id}, expected {expected}"),
                    )),
                    _ => Ok(expected),
                }
            })
            .collect()
    }

    /// Filter `corpus`, returning the kept records with per-run counters.
    ///
    /// Kept records carry their resolved identifier. Partitions keep their
    /// keys and order; a partition whose records were all removed is
    /// returned empty. Nothing is returned unless every partition resolved
    /// and every duplicate identifier was found, or `allow_unresolved` is set.
    pub fn remove_with_stats<I>(
        &self,
        corpus: I,
        duplicate_ids: &BTreeSet<Identifier>,
    ) -> Result<(Vec<CorpusPartition>, RemovalStats)>
    where
        I: IntoIterator<Item = CorpusPartition>,
    {
        let mut stats = RemovalStats::default();
        let mut matched: BTreeSet<Identifier> = BTreeSet::new();
        let mut filtered = Vec::new();

        for partition in corpus {
            let ids = self.resolve_partition(&partition)?;
            stats.partitions += 1;
            stats.records_in += partition.len();

            let key = partition.key;
            let records: Vec<_> = partition
                .records
                .into_iter()
                .zip(ids)
                .filter_map(|(mut record, id)| {
                    if duplicate_ids.contains(&id) {
                        matched.insert(id);
                        None
                    } else {
                        record.id = Some(id);
                        Some(record)
                    }
                })
                .collect();

            debug!("partition '{key}': kept {} records", records.len());
            stats.records_out += records.len();
            filtered.push(CorpusPartition::new(key, records));
        }
        stats.records_removed = stats.records_in - stats.records_out;

        let unresolved: Vec<Identifier> = duplicate_ids.difference(&matched).copied().collect();
        stats.unresolved = unresolved.len();
        if !unresolved.is_empty() {
            if !self.config.allow_unresolved {
                return Err(DedupError::UnresolvedIdentifiers {
                    count: unresolved.len(),
                    sample: unresolved.into_iter().take(UNRESOLVED_SAMPLE).collect(),
                });
            }
            warn!(
                "{} duplicate identifiers did not match any record",
                unresolved.len()
            );
        }

        info!(
            "removal: {} partitions, {} records in, {} removed, {} kept",
            stats.partitions, stats.records_in, stats.records_removed, stats.records_out
        );
        Ok((filtered, stats))
    }

    /// Filter `corpus`.
    pub fn remove<I>(
        &self,
        corpus: I,
        duplicate_ids: &BTreeSet<Identifier>,
    ) -> Result<Vec<CorpusPartition>>
    where
        I: IntoIterator<Item = CorpusPartition>,
    {
        Ok(self.remove_with_stats(corpus, duplicate_ids)?.0)
    }

    /// Filter `corpus` and write every partition as JSON lines into `output`,
    /// named by its partition key.
    ///
    /// All partitions are staged first and renamed into place only after the
    /// whole run succeeded, so a failure leaves `output` without new files.
    pub fn remove_to_storage<I>(
        &self,
        corpus: I,
        duplicate_ids: &BTreeSet<Identifier>,
        output: &dyn Storage,
        text_field: &str,
        id_field: Option<&str>,
    ) -> Result<RemovalStats>
    where
        I: IntoIterator<Item = CorpusPartition>,
    {
        let (filtered, stats) = self.remove_with_stats(corpus, duplicate_ids)?;
        let parts = filtered
            .iter()
            .map(|p| Ok((p.key.clone(), records_to_jsonl(&p.records, text_field, id_field)?)))
            .collect::<Result<Vec<_>>>()?;
        storage::commit_staged(output, &parts)?;
        Ok(stats)
    }
}
