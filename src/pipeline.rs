//! End-to-end identification and removal runs.
//!
//! [`DedupPipeline::identify`] assigns identifiers, runs every enabled engine
//! over the corpus, unions their results, and only then persists the
//! identifier snapshot and the duplicate-ID set. A failing or cancelled run
//! leaves the previously persisted snapshot untouched.
//!
//! [`DedupPipeline::remove`] replays the corpus against the persisted snapshot
//! and duplicate-ID set.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use uuid::Uuid;

use crate::Identifier;
use crate::config::DedupConfig;
use crate::document::{CorpusPartition, DocumentRecord};
use crate::error::{DedupError, Result};
use crate::exact::ExactMatchEngine;
use crate::fuzzy::FuzzyMatchEngine;
use crate::identifier::{
    IdentifierHandle, IdentifierService, IdentifierState, SnapshotStore, assign_partition_ids,
};
use crate::output::{DuplicateIdWriter, read_duplicate_ids};
use crate::removal::{RemovalEngine, RemovalStats};
use crate::semantic::{KeepPolicy, SemanticMatchEngine, SemanticResult, priorities_from_documents};
use crate::storage::Storage;
use crate::util::CancellationToken;

/// Summary of one identification run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Unique id of the run, used in log lines.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Partitions processed.
    pub partitions: usize,
    /// Documents processed.
    pub documents: usize,
    /// Duplicates found by the exact engine, if it ran.
    pub exact: Option<usize>,
    /// Duplicates found by the fuzzy engine, if it ran.
    pub fuzzy: Option<usize>,
    /// Result of the semantic engine, if it ran.
    pub semantic: Option<SemanticResult>,
    /// Union of all engines' results.
    pub duplicate_ids: BTreeSet<Identifier>,
    /// Duplicate-ID part files written.
    pub output_files: Vec<String>,
    /// Identifier state persisted at the end of the run.
    pub identifier_state: IdentifierState,
}

/// Runs the configured workflows against one working storage.
#[derive(Debug, Clone)]
pub struct DedupPipeline {
    config: DedupConfig,
    storage: Arc<dyn Storage>,
    cancel: CancellationToken,
}

impl DedupPipeline {
    /// Create a pipeline. The snapshot and duplicate-ID parts live in `storage`.
    pub fn new(config: DedupConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        config.validate()?;
        Ok(DedupPipeline {
            config,
            storage,
            cancel: CancellationToken::new(),
        })
    }

    /// Share `token` with every engine of the run.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The pipeline's configuration.
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    fn snapshot_store(&self) -> SnapshotStore {
        SnapshotStore::new(
            self.storage.clone(),
            self.config.identifiers.snapshot_file.clone(),
        )
    }

    /// Give every record of `partition` its identifier.
    ///
    /// A partition already known to the snapshot gets its previous range
    /// back, so re-running over the same corpus reproduces the same
    /// identifiers. With `overwrite` a fresh range is issued instead.
    fn stamp_partition(
        &self,
        handle: &IdentifierHandle,
        known: &IdentifierState,
        partition: &mut CorpusPartition,
    ) -> Result<()> {
        let overwrite = self.config.identifiers.overwrite;
        match known.range(&partition.key) {
            Some(range) if !overwrite => {
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
                for (record, id) in partition.records.iter_mut().zip(range.start..range.end) {
                    record.id = Some(id);
                }
                Ok(())
            }
            _ => assign_partition_ids(handle, partition, overwrite).map(|_| ()),
        }
    }

    /// Assign identifiers and identify duplicates across `partitions`.
    ///
    /// `embeddings` is required when the semantic engine is enabled. Records
    /// in `partitions` carry their identifiers when this returns.
    pub fn identify(
        &self,
        partitions: &mut [CorpusPartition],
        embeddings: Option<&HashMap<Identifier, Vec<f32>>>,
    ) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        if self.config.semantic.enabled && embeddings.is_none() {
            return Err(DedupError::invalid_config(
                "semantic matching is enabled but no embeddings were supplied",
            ));
        }

        let store = self.snapshot_store();
        let known = store.load_or_default()?;
        info!(
            "run {run_id}: {} partitions, identifier state at next_id={}",
            partitions.len(),
            known.next_id
        );

        let service = IdentifierService::restore(known.clone())?;
        if self.config.identifiers.assign_ids {
            let handle = service.handle();
            for partition in partitions.iter_mut() {
                self.cancel.check("identifier assignment")?;
                self.stamp_partition(&handle, &known, partition)?;
            }
        }

        let documents: Vec<DocumentRecord> = partitions
            .iter()
            .flat_map(|p| p.records.iter().cloned())
            .collect();
        if let Some(embeddings) = embeddings.filter(|_| self.config.semantic.enabled) {
            check_embedding_keys(&documents, embeddings)?;
        }
        let mut duplicate_ids = BTreeSet::new();

        let exact = if self.config.exact.enabled {
            let found = ExactMatchEngine::new(self.config.exact.clone())?.identify(&documents)?;
            self.cancel.check("exact matching")?;
            let count = found.len();
            duplicate_ids.extend(found);
            Some(count)
        } else {
            None
        };

        let fuzzy = if self.config.fuzzy.enabled {
            let found = FuzzyMatchEngine::new(self.config.fuzzy.clone())?
                .with_cancellation(self.cancel.clone())
                .identify(&documents)?;
            let count = found.len();
            duplicate_ids.extend(found);
            Some(count)
        } else {
            None
        };

        let semantic = match embeddings {
            Some(embeddings) if self.config.semantic.enabled => {
                let mut engine = SemanticMatchEngine::new(self.config.semantic.clone())?
                    .with_cancellation(self.cancel.clone());
                if let KeepPolicy::MetadataRanked { field, .. } =
                    &self.config.semantic.which_to_keep
                {
                    engine = engine.with_priorities(priorities_from_documents(&documents, field)?);
                }
                let result = engine.identify(embeddings)?;
                duplicate_ids.extend(result.duplicate_ids.iter().copied());
                Some(result)
            }
            _ => None,
        };

        // Every engine succeeded: only now is the new state made durable.
        let identifier_state = service.shutdown()?;
        store.save(&identifier_state)?;
        let writer = DuplicateIdWriter::from_config(&self.config.output)?;
        let output_files = writer.write(self.storage.as_ref(), &duplicate_ids)?;

        info!(
            "run {run_id}: {} documents, {} duplicates in total",
            documents.len(),
            duplicate_ids.len()
        );
        Ok(PipelineReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            partitions: partitions.len(),
            documents: documents.len(),
            exact,
            fuzzy,
            semantic,
            duplicate_ids,
            output_files,
            identifier_state,
        })
    }

    /// Remove the persisted duplicate-ID set from `corpus` and write the
    /// filtered partitions as JSON lines into `output`.
    ///
    /// Records without an identifier are resolved through the persisted
    /// snapshot, which must exist.
    pub fn remove<I>(&self, corpus: I, output: &dyn Storage) -> Result<RemovalStats>
    where
        I: IntoIterator<Item = CorpusPartition>,
    {
        let state = self.snapshot_store().load()?;
        let duplicate_ids =
            read_duplicate_ids(self.storage.as_ref(), &self.config.output.duplicate_id_prefix)?;

        RemovalEngine::new(self.config.removal.clone())
            .with_state(state)
            .remove_to_storage(
                corpus,
                &duplicate_ids,
                output,
                &self.config.exact.text_field,
                Some(&self.config.identifiers.id_field),
            )
    }
}

/// Every embedding must belong to a record of the corpus, otherwise its
/// identifier could end up in the duplicate-ID set and fail removal later.
fn check_embedding_keys(
    documents: &[DocumentRecord],
    embeddings: &HashMap<Identifier, Vec<f32>>,
) -> Result<()> {
    let corpus_ids: HashSet<Identifier> = documents.iter().filter_map(|d| d.id).collect();
    let mut unknown: Vec<Identifier> = embeddings
        .keys()
        .filter(|id| !corpus_ids.contains(id))
        .copied()
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort_unstable();
    Err(DedupError::invalid_config(format!(
        "{} embeddings have no record in the corpus (first: {})",
        unknown.len(),
        unknown[0]
    )))
}
