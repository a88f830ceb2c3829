//! The [`Storage`] seam and its error and configuration types.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{DedupError, Result};

/// A flat namespace of named byte files.
///
/// Names are plain file names: snapshot files, duplicate-ID parts, corpus
/// partitions. Writers become visible to readers only once closed, and
/// [`Storage::rename_file`] is the commit point for staged outputs.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open `name` for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create or truncate `name` for writing.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    fn file_exists(&self, name: &str) -> bool;

    /// Delete `name`. Deleting a missing file is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// All file names, sorted.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Move `old_name` to `new_name`, replacing the target.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Make completed renames and deletions durable.
    fn sync(&self) -> Result<()>;
}

/// A readable file.
pub trait StorageInput: Read + Send + std::fmt::Debug {
    /// Length in bytes.
    fn size(&self) -> Result<u64>;
}

/// A writable file.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush buffered bytes, and fsync when the backend is configured to.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Finish the file. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Backend tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Read and write buffer capacity in bytes.
    pub buffer_size: usize,
    /// fsync file contents on `flush_and_sync` and `close`.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            buffer_size: 64 * 1024,
            sync_writes: true,
        }
    }
}

/// Failures of a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file '{0}' does not exist")]
    NotFound(String),

    /// Names must be single path components.
    #[error("invalid file name '{0}'")]
    InvalidName(String),

    #[error("output '{0}' is already closed")]
    Closed(String),

    #[error("{op} '{name}' failed: {source}")]
    Io {
        op: &'static str,
        name: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(op: &'static str, name: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(name.to_string())
        } else {
            StorageError::Io {
                op,
                name: name.to_string(),
                source,
            }
        }
    }
}

impl From<StorageError> for DedupError {
    fn from(err: StorageError) -> Self {
        DedupError::storage(err.to_string())
    }
}

/// Reject names that would escape a flat namespace.
pub(crate) fn check_name(name: &str) -> std::result::Result<(), StorageError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
