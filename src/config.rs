//! Configuration for the deduplication workflows.
//!
//! [`DedupConfig`] groups one section per component. Every section has
//! serde defaults, so a JSON document only needs to name what it changes:
//!
//! ```
//! use curator_dedup::config::DedupConfig;
//!
//! let config = DedupConfig::from_json_str(r#"{
//!     "fuzzy": { "num_bands": 10, "minhashes_per_band": 5 },
//!     "semantic": { "eps": 0.05, "which_to_keep": "easy", "distance_metric": "l2" }
//! }"#).unwrap();
//!
//! assert_eq!(config.fuzzy.signature_length(), 50);
//! assert_eq!(config.fuzzy.char_ngrams, 24);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::DEFAULT_TEXT_FIELD;
use crate::error::{DedupError, Result};
use crate::semantic::{DistanceMetric, KeepPolicy};

fn default_text_field() -> String {
    DEFAULT_TEXT_FIELD.to_string()
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Identifier assignment and snapshot location.
    pub identifiers: IdentifierConfig,
    /// Exact matching.
    pub exact: ExactConfig,
    /// Fuzzy (MinHash/LSH) matching.
    pub fuzzy: FuzzyConfig,
    /// Semantic (embedding) matching.
    pub semantic: SemanticConfig,
    /// Removal.
    pub removal: RemovalConfig,
    /// Duplicate-ID set output.
    pub output: OutputConfig,
}

impl DedupConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DedupConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON document from disk.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.identifiers.validate()?;
        self.exact.validate()?;
        self.fuzzy.validate()?;
        self.semantic.validate()?;
        self.output.validate()
    }
}

/// Identifier assignment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierConfig {
    /// Assign identifiers through the identifier service instead of reading them.
    pub assign_ids: bool,
    /// Name of the identifier field in serialized records.
    pub id_field: String,
    /// Snapshot file name inside the working storage.
    pub snapshot_file: String,
    /// Re-issue ranges for partitions that already have one.
    pub overwrite: bool,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            assign_ids: true,
            id_field: "id".to_string(),
            snapshot_file: "identifiers.json".to_string(),
            overwrite: false,
        }
    }
}

impl IdentifierConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<()> {
        if self.id_field.is_empty() {
            return Err(DedupError::invalid_config("id_field must not be empty"));
        }
        if self.snapshot_file.is_empty() {
            return Err(DedupError::invalid_config("snapshot_file must not be empty"));
        }
        Ok(())
    }
}

/// Exact matching settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactConfig {
    /// Run this engine in the pipeline.
    pub enabled: bool,
    /// Field whose text is hashed.
    pub text_field: String,
    /// Trim and collapse whitespace before hashing.
    pub normalize: bool,
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            text_field: default_text_field(),
            normalize: false,
        }
    }
}

impl ExactConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<()> {
        if self.text_field.is_empty() {
            return Err(DedupError::invalid_config("exact.text_field must not be empty"));
        }
        Ok(())
    }
}

/// Fuzzy matching settings.
///
/// The defaults (`20` bands of `13` minhashes over `24`-character shingles)
/// put the banding curve's midpoint near a Jaccard similarity of 0.8.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Run this engine in the pipeline.
    pub enabled: bool,
    /// Field whose text is shingled.
    pub text_field: String,
    /// Shingle length in characters.
    pub char_ngrams: usize,
    /// Number of LSH bands.
    pub num_bands: usize,
    /// Minhash values per band.
    pub minhashes_per_band: usize,
    /// Seed for the hash permutations.
    pub seed: u64,
    /// Number of shuffle partitions used for bucket grouping.
    pub shuffle_partitions: usize,
    /// If set, drop bucket edges whose true shingle Jaccard is below this value.
    pub jaccard_threshold: Option<f64>,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            text_field: default_text_field(),
            char_ngrams: 24,
            num_bands: 20,
            minhashes_per_band: 13,
            seed: 42,
            shuffle_partitions: num_cpus::get().max(1),
            jaccard_threshold: None,
        }
    }
}

impl FuzzyConfig {
    /// Total signature length, `num_bands * minhashes_per_band`.
    pub fn signature_length(&self) -> usize {
        self.num_bands * self.minhashes_per_band
    }

    /// Set the LSH shape.
    pub fn with_bands(mut self, num_bands: usize, minhashes_per_band: usize) -> Self {
        self.num_bands = num_bands;
        self.minhashes_per_band = minhashes_per_band;
        self
    }

    /// Set the shingle length.
    pub fn with_char_ngrams(mut self, char_ngrams: usize) -> Self {
        self.char_ngrams = char_ngrams;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of shuffle partitions.
    pub fn with_shuffle_partitions(mut self, partitions: usize) -> Self {
        self.shuffle_partitions = partitions;
        self
    }

    /// Enable the Jaccard false-positive check.
    pub fn with_jaccard_threshold(mut self, threshold: f64) -> Self {
        self.jaccard_threshold = Some(threshold);
        self
    }

    /// Validate the section.
    pub fn validate(&self) -> Result<()> {
        if self.char_ngrams == 0 {
            return Err(DedupError::invalid_config("char_ngrams must be at least 1"));
        }
        if self.num_bands == 0 || self.minhashes_per_band == 0 {
            return Err(DedupError::invalid_config(
                "num_bands and minhashes_per_band must be at least 1",
            ));
        }
        if self.shuffle_partitions == 0 {
            return Err(DedupError::invalid_config(
                "shuffle_partitions must be at least 1",
            ));
        }
        if let Some(t) = self.jaccard_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(DedupError::invalid_config(format!(
                    "jaccard_threshold must be within [0, 1], got {t}"
                )));
            }
        }
        if self.text_field.is_empty() {
            return Err(DedupError::invalid_config("fuzzy.text_field must not be empty"));
        }
        Ok(())
    }
}

/// Semantic matching settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Run this engine in the pipeline (requires embeddings).
    pub enabled: bool,
    /// Number of k-means centroids.
    pub n_clusters: usize,
    /// Distance threshold; pairs closer than this are duplicates.
    pub eps: f64,
    /// Which member of a duplicate cluster survives.
    pub which_to_keep: KeepPolicy,
    /// Distance used for clustering and pairwise comparison.
    pub distance_metric: DistanceMetric,
    /// Maximum k-means iterations.
    pub max_iter: usize,
    /// Mean centroid movement below which k-means stops.
    pub tol: f64,
    /// Seed for k-means++ initialisation and the `random` keep policy.
    pub seed: u64,
    /// Rows per pairwise-distance batch.
    pub pairwise_batch_size: usize,
    /// Upper bound on one batch's distance matrix, in bytes.
    pub max_pairwise_bytes: Option<usize>,
    /// L2-normalize embeddings before clustering (cosine metric only).
    pub normalize: bool,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            n_clusters: 1000,
            eps: 0.01,
            which_to_keep: KeepPolicy::Hard,
            distance_metric: DistanceMetric::Cosine,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
            pairwise_batch_size: 1024,
            max_pairwise_bytes: None,
            normalize: true,
        }
    }
}

impl SemanticConfig {
    /// Set the number of clusters.
    pub fn with_n_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = n_clusters;
        self
    }

    /// Set the distance threshold.
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Set the keep policy.
    pub fn with_keep_policy(mut self, policy: KeepPolicy) -> Self {
        self.which_to_keep = policy;
        self
    }

    /// Set the distance metric.
    pub fn with_distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.distance_metric = metric;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the pairwise batch size.
    pub fn with_pairwise_batch_size(mut self, batch_size: usize) -> Self {
        self.pairwise_batch_size = batch_size;
        self
    }

    /// Set the memory bound for one pairwise batch.
    pub fn with_max_pairwise_bytes(mut self, bytes: usize) -> Self {
        self.max_pairwise_bytes = Some(bytes);
        self
    }

    /// Validate the section.
    pub fn validate(&self) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(DedupError::invalid_config("n_clusters must be at least 1"));
        }
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(DedupError::invalid_config(format!(
                "eps must be a non-negative distance, got {}",
                self.eps
            )));
        }
        if self.max_iter == 0 {
            return Err(DedupError::invalid_config("max_iter must be at least 1"));
        }
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(DedupError::invalid_config("tol must be non-negative"));
        }
        if self.pairwise_batch_size == 0 {
            return Err(DedupError::invalid_config(
                "pairwise_batch_size must be at least 1",
            ));
        }
        if let KeepPolicy::MetadataRanked { field, .. } = &self.which_to_keep {
            if field.is_empty() {
                return Err(DedupError::invalid_config(
                    "metadata_ranked keep policy needs a priority field",
                ));
            }
        }
        Ok(())
    }
}

/// Removal settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Tolerate duplicate identifiers that never appear in the corpus.
    pub allow_unresolved: bool,
}

/// Duplicate-ID set output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File name prefix of the duplicate-ID parts.
    pub duplicate_id_prefix: String,
    /// Maximum identifiers per part file.
    pub rows_per_file: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            duplicate_id_prefix: "duplicate_ids".to_string(),
            rows_per_file: 1_000_000,
        }
    }
}

impl OutputConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<()> {
        if self.duplicate_id_prefix.is_empty() {
            return Err(DedupError::invalid_config(
                "duplicate_id_prefix must not be empty",
            ));
        }
        if self.rows_per_file == 0 {
            return Err(DedupError::invalid_config("rows_per_file must be at least 1"));
        }
        Ok(())
    }
}
