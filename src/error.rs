//! Error types for the deduplication engine.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`DedupError`] enum. Variants fall into three groups:
//!
//! - **configuration errors** are fatal and surface immediately (bad
//!   parameters, a corpus partitioned differently from when identifiers were
//!   assigned, a missing identifier snapshot);
//! - **resource errors** carry the stage and batch index that failed so the
//!   caller can lower a batch-size knob and retry;
//! - **plumbing errors** wrap I/O, JSON and storage failures.
//!
//! # Examples
//!
//! ```
//! use curator_dedup::error::{DedupError, Result};
//!
//! fn check_bands(num_bands: usize) -> Result<()> {
//!     if num_bands == 0 {
//!         return Err(DedupError::invalid_config("num_bands must be at least 1"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_bands(0).is_err());
//! ```

use std::io;

use thiserror::Error;

use crate::Identifier;

/// The main error type for deduplication operations.
#[derive(Error, Debug)]
pub enum DedupError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid parameter or parameter combination
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A partition key was assigned an identifier range twice without overwrite.
    #[error("Identifier range already assigned for partition '{partition}'")]
    RangeConflict { partition: String },

    /// Auto-assigned identifiers are in play but no identifier snapshot was supplied.
    #[error("Identifier snapshot is missing: {0}")]
    MissingSnapshot(String),

    /// The corpus is not partitioned the way it was when identifiers were assigned.
    #[error("Partition mismatch for '{partition}': {reason}")]
    PartitionMismatch { partition: String, reason: String },

    /// Duplicate identifiers that never matched a record of the corpus.
    #[error("{count} duplicate identifiers did not resolve against the corpus (e.g. {sample:?})")]
    UnresolvedIdentifiers {
        count: usize,
        sample: Vec<Identifier>,
    },

    /// A record reached a matching engine without an identifier.
    #[error("Document at position {position} has no identifier")]
    MissingIdentifier { position: usize },

    /// Embedding dimensions disagree.
    #[error("Dimension mismatch: expected {expected}, got {actual} for document {id}")]
    DimensionMismatch {
        id: Identifier,
        expected: usize,
        actual: usize,
    },

    /// A batch exceeded its resource budget. Retry with a smaller batch size.
    #[error("Resource exhausted in stage '{stage}' at batch {batch}: {message}")]
    ResourceExhausted {
        stage: String,
        batch: usize,
        message: String,
    },

    /// Persisted data failed validation (checksum, version).
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    /// Operation cancelled
    #[error("Operation cancelled: {0}")]
    OperationCancelled(String),

    /// The identifier service actor is no longer running.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with DedupError.
pub type Result<T> = std::result::Result<T, DedupError>;

impl DedupError {
    /// Create a new invalid configuration error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        DedupError::InvalidConfig(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        DedupError::Storage(msg.into())
    }

    /// Create a new partition mismatch error.
    pub fn partition_mismatch<P: Into<String>, R: Into<String>>(partition: P, reason: R) -> Self {
        DedupError::PartitionMismatch {
            partition: partition.into(),
            reason: reason.into(),
        }
    }

    /// Create a new resource exhaustion error.
    pub fn resource_exhausted<S: Into<String>, M: Into<String>>(
        stage: S,
        batch: usize,
        message: M,
    ) -> Self {
        DedupError::ResourceExhausted {
            stage: stage.into(),
            batch,
            message: message.into(),
        }
    }

    /// Create a new corrupted data error.
    pub fn corrupted<S: Into<String>>(msg: S) -> Self {
        DedupError::Corrupted(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        DedupError::OperationCancelled(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DedupError::Other(msg.into())
    }

    /// Whether the caller can retry this error, typically after lowering a batch size.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DedupError::ResourceExhausted { .. })
    }

    /// Whether this is a configuration error that must be fixed before rerunning.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DedupError::InvalidConfig(_)
                | DedupError::RangeConflict { .. }
                | DedupError::MissingSnapshot(_)
                | DedupError::PartitionMismatch { .. }
                | DedupError::UnresolvedIdentifiers { .. }
                | DedupError::MissingIdentifier { .. }
                | DedupError::DimensionMismatch { .. }
        )
    }
}
