//! # curator-dedup
//!
//! Deduplication engine for large text corpora.
//!
//! ## Features
//!
//! - Stable integer identifiers assigned by a single-owner service, persisted
//!   as a checksummed snapshot
//! - Exact matching on 128-bit xxh3 digests
//! - Fuzzy matching with seeded MinHash signatures, LSH banding and a
//!   sharded union-find merge
//! - Semantic matching with seeded k-means and batched pairwise distances
//! - Removal that replays the corpus against a duplicate-ID set, all or nothing
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use curator_dedup::config::DedupConfig;
//! use curator_dedup::document::{CorpusPartition, DocumentRecord};
//! use curator_dedup::pipeline::DedupPipeline;
//! use curator_dedup::storage::MemoryStorage;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let pipeline = DedupPipeline::new(DedupConfig::default(), storage).unwrap();
//!
//! let mut corpus = vec![CorpusPartition::new(
//!     "shard-0",
//!     vec![DocumentRecord::new("hello"), DocumentRecord::new("hello")],
//! )];
//! let report = pipeline.identify(&mut corpus, None).unwrap();
//! assert_eq!(report.duplicate_ids.len(), 1);
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod exact;
pub mod fuzzy;
pub mod identifier;
pub mod output;
pub mod pipeline;
pub mod removal;
pub mod semantic;
pub mod storage;
pub mod util;

/// Document identifier.
pub type Identifier = u64;

pub mod prelude {
    pub use crate::Identifier;
    pub use crate::config::DedupConfig;
    pub use crate::document::{CorpusPartition, DocumentRecord, FieldValue};
    pub use crate::error::{DedupError, Result};
    pub use crate::exact::ExactMatchEngine;
    pub use crate::fuzzy::FuzzyMatchEngine;
    pub use crate::identifier::{IdentifierService, SnapshotStore};
    pub use crate::pipeline::DedupPipeline;
    pub use crate::removal::RemovalEngine;
    pub use crate::semantic::{DistanceMetric, KeepPolicy, SemanticMatchEngine};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
