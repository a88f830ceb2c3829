//! The semantic matching engine.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info};
use rayon::prelude::*;

use crate::Identifier;
use crate::config::SemanticConfig;
use crate::document::{CorpusPartition, DocumentRecord};
use crate::error::{DedupError, Result};
use crate::removal::RemovalEngine;
use crate::semantic::distance::{DistanceMetric, normalize};
use crate::semantic::keep_policy::{KeepCandidate, KeepPolicy};
use crate::semantic::kmeans::KMeans;
use crate::util::{CancellationToken, UnionFind};

/// Per-centroid statistics of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterStats {
    /// Centroid index.
    pub cluster: usize,
    /// Vectors assigned to the centroid.
    pub size: usize,
    /// Members marked for removal.
    pub duplicates: usize,
    /// Largest member-to-centroid distance.
    pub max_centroid_distance: f32,
}

/// Outcome of [`SemanticMatchEngine::identify`].
#[derive(Debug, Clone, Default)]
pub struct SemanticResult {
    /// Identifiers to remove.
    pub duplicate_ids: BTreeSet<Identifier>,
    /// Survivors of every duplicate component.
    pub kept: BTreeSet<Identifier>,
    /// Statistics for every non-empty centroid.
    pub clusters: Vec<ClusterStats>,
    /// k-means iterations run.
    pub iterations: usize,
}

/// Embedding-space near-duplicate detector.
#[derive(Debug, Clone)]
pub struct SemanticMatchEngine {
    config: SemanticConfig,
    priorities: Option<HashMap<Identifier, f64>>,
    cancel: Option<CancellationToken>,
}

impl SemanticMatchEngine {
    /// Create a new engine.
    pub fn new(config: SemanticConfig) -> Result<Self> {
        config.validate()?;
        Ok(SemanticMatchEngine {
            config,
            priorities: None,
            cancel: None,
        })
    }

    /// Supply the priorities ranked by the `metadata_ranked` keep policy.
    pub fn with_priorities(mut self, priorities: HashMap<Identifier, f64>) -> Self {
        self.priorities = Some(priorities);
        self
    }

    /// Observe `token` between k-means iterations and pairwise batches.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The engine's configuration.
    pub fn config(&self) -> &SemanticConfig {
        &self.config
    }

    fn check_cancelled(&self, stage: &str) -> Result<()> {
        match &self.cancel {
            Some(token) => token.check(stage),
            None => Ok(()),
        }
    }

    /// Validate embeddings and lay them out in ascending identifier order.
    fn prepare(
        &self,
        embeddings: &HashMap<Identifier, Vec<f32>>,
    ) -> Result<(Vec<Identifier>, Vec<Vec<f32>>)> {
        let mut ids: Vec<Identifier> = embeddings.keys().copied().collect();
        ids.sort_unstable();

        let expected = embeddings[&ids[0]].len();
        if expected == 0 {
            return Err(DedupError::invalid_config(format!(
                "embedding of document {} is empty",
                ids[0]
            )));
        }

        let mut vectors = Vec::with_capacity(ids.len());
        for &id in &ids {
            let vector = &embeddings[&id];
            if vector.len() != expected {
                return Err(DedupError::DimensionMismatch {
                    id,
                    expected,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(DedupError::invalid_config(format!(
                    "embedding of document {id} contains NaN or infinite values"
                )));
            }

            let mut vector = vector.clone();
            if self.config.normalize && self.config.distance_metric == DistanceMetric::Cosine {
                normalize(&mut vector);
            }
            vectors.push(vector);
        }

        Ok((ids, vectors))
    }

    /// Pairs of `members` (indices into `vectors`) closer than `eps`.
    ///
    /// Rows are processed in batches of `pairwise_batch_size`; every batch
    /// materializes a `rows x members` distance matrix, which must fit within
    /// `max_pairwise_bytes` when set.
    fn threshold_edges(
        &self,
        members: &[usize],
        vectors: &[Vec<f32>],
        batch_counter: &mut usize,
    ) -> Result<Vec<(usize, usize)>> {
        let metric = self.config.distance_metric;
        let eps = self.config.eps;
        let width = members.len();
        let mut edges = Vec::new();

        for (offset, rows) in members
            .chunks(self.config.pairwise_batch_size)
            .enumerate()
            .map(|(i, rows)| (i * self.config.pairwise_batch_size, rows))
        {
            let batch = *batch_counter;
            *batch_counter += 1;
            self.check_cancelled("pairwise distances")?;

            let matrix_bytes = rows.len() * width * std::mem::size_of::<f32>();
            if let Some(limit) = self.config.max_pairwise_bytes {
                if matrix_bytes > limit {
                    return Err(DedupError::resource_exhausted(
                        "pairwise",
                        batch,
                        format!(
                            "distance matrix of {} x {width} needs {matrix_bytes} bytes, limit is {limit}",
                            rows.len()
                        ),
                    ));
                }
            }

            let mut matrix = vec![0.0f32; rows.len() * width];
            matrix
                .par_chunks_mut(width)
                .zip(rows.par_iter())
                .for_each(|(row, &i)| {
                    for (slot, &j) in row.iter_mut().zip(members) {
                        *slot = metric.distance(&vectors[i], &vectors[j]);
                    }
                });

            for (r, row) in matrix.chunks(width).enumerate() {
                let position = offset + r;
                for (column, &distance) in row.iter().enumerate().skip(position + 1) {
                    if (distance as f64) < eps {
                        edges.push((members[position], members[column]));
                    }
                }
            }
        }

        Ok(edges)
    }

    /// Cluster the embeddings and report near-duplicates.
    ///
    /// Output identifiers are always a subset of the keys of `embeddings`; an
    /// empty map yields an empty result.
    pub fn identify(&self, embeddings: &HashMap<Identifier, Vec<f32>>) -> Result<SemanticResult> {
        if embeddings.is_empty() {
            return Ok(SemanticResult::default());
        }
        if matches!(self.config.which_to_keep, KeepPolicy::MetadataRanked { .. })
            && self.priorities.is_none()
        {
            return Err(DedupError::invalid_config(
                "metadata_ranked keep policy needs priorities, see with_priorities",
            ));
        }

        let (ids, vectors) = self.prepare(embeddings)?;
        let model = KMeans::new(self.config.n_clusters, self.config.distance_metric)
            .with_max_iter(self.config.max_iter)
            .with_tol(self.config.tol)
            .with_seed(self.config.seed)
            .fit(&vectors, self.cancel.as_ref())?;
        debug!(
            "semantic: {} vectors in {} clusters after {} iterations",
            vectors.len(),
            model.centroids.len(),
            model.iterations
        );

        let mut by_cluster: Vec<Vec<usize>> = vec![Vec::new(); model.centroids.len()];
        for (index, &cluster) in model.assignments.iter().enumerate() {
            by_cluster[cluster].push(index);
        }

        let mut result = SemanticResult {
            iterations: model.iterations,
            ..Default::default()
        };
        let mut batch_counter = 0;

        for (cluster, members) in by_cluster.iter().enumerate() {
            if members.is_empty() {
                continue;
            }
            let max_centroid_distance = members
                .iter()
                .map(|&i| model.distances[i])
                .fold(0.0f32, f32::max);
            let mut stats = ClusterStats {
                cluster,
                size: members.len(),
                duplicates: 0,
                max_centroid_distance,
            };

            if members.len() > 1 {
                let mut components = UnionFind::new();
                for (a, b) in self.threshold_edges(members, &vectors, &mut batch_counter)? {
                    components.union(ids[a], ids[b]);
                }

                let index_of: HashMap<Identifier, usize> =
                    members.iter().map(|&i| (ids[i], i)).collect();
                for component in components.components(2) {
                    let candidates: Vec<KeepCandidate> = component
                        .iter()
                        .map(|id| KeepCandidate {
                            id: *id,
                            centroid_distance: model.distances[index_of[id]],
                        })
                        .collect();
                    let keep = self.config.which_to_keep.select(
                        &candidates,
                        self.config.seed,
                        self.priorities.as_ref(),
                    )?;

                    result.kept.insert(keep);
                    for id in component.into_iter().filter(|id| *id != keep) {
                        result.duplicate_ids.insert(id);
                        stats.duplicates += 1;
                    }
                }
            }

            result.clusters.push(stats);
        }

        info!(
            "semantic match: {} embeddings, {} clusters, {} to remove (eps={}, keep={})",
            ids.len(),
            result.clusters.len(),
            result.duplicate_ids.len(),
            self.config.eps,
            self.config.which_to_keep.name()
        );
        Ok(result)
    }

    /// Identify duplicates and apply them to `corpus` in one call.
    ///
    /// Nothing is returned unless both identification and removal succeed.
    pub fn identify_and_remove<I>(
        &self,
        corpus: I,
        embeddings: &HashMap<Identifier, Vec<f32>>,
        removal: &RemovalEngine,
    ) -> Result<(SemanticResult, Vec<CorpusPartition>)>
    where
        I: IntoIterator<Item = CorpusPartition>,
    {
        let result = self.identify(embeddings)?;
        let filtered = removal.remove(corpus, &result.duplicate_ids)?;
        Ok((result, filtered))
    }
}

/// Build a priority map for the `metadata_ranked` keep policy from a numeric
/// document field. Documents without the field are left out.
pub fn priorities_from_documents(
    documents: &[DocumentRecord],
    field: &str,
) -> Result<HashMap<Identifier, f64>> {
    let mut priorities = HashMap::with_capacity(documents.len());
    for (position, doc) in documents.iter().enumerate() {
        let id = doc.id.ok_or(DedupError::MissingIdentifier { position })?;
        if let Some(value) = doc.get_field(field).and_then(|v| v.as_f64()) {
            priorities.insert(id, value);
        }
    }
    Ok(priorities)
}
