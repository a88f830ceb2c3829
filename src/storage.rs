//! Storage abstraction for snapshots, duplicate-ID sets and corpus partitions.
//!
//! Every persisted artifact of the engine goes through the [`Storage`] trait
//! so that the same code runs against a directory on disk ([`FileStorage`])
//! or an in-memory map ([`MemoryStorage`]) in tests.
//!
//! Multi-file outputs are committed with [`commit_staged`]: parts are first
//! written under a staging name and only renamed to their final names once
//! every part has been written, so a failed run never leaves a partial output
//! visible under the final names.
//!
//! # Example
//!
//! ```
//! use std::io::{Read, Write};
//!
//! use curator_dedup::storage::{MemoryStorage, Storage};
//!
//! let storage = MemoryStorage::new();
//! let mut output = storage.create_output("hello.txt").unwrap();
//! output.write_all(b"hello").unwrap();
//! output.close().unwrap();
//!
//! let mut input = storage.open_input("hello.txt").unwrap();
//! let mut buf = String::new();
//! input.read_to_string(&mut buf).unwrap();
//! assert_eq!(buf, "hello");
//! ```

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::{Storage, StorageConfig, StorageError, StorageInput, StorageOutput};

use std::io::{Read, Write};

use crate::error::Result;

/// Suffix used for staged (not yet committed) files.
pub const STAGING_SUFFIX: &str = ".staging";

/// Read a whole file into memory.
pub fn read_all(storage: &dyn Storage, name: &str) -> Result<Vec<u8>> {
    let mut input = storage.open_input(name)?;
    let mut buf = Vec::with_capacity(input.size()? as usize);
    input.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Write `bytes` to `name` through a staging file and an atomic rename.
pub fn write_atomic(storage: &dyn Storage, name: &str, bytes: &[u8]) -> Result<()> {
    let staged = format!("{name}{STAGING_SUFFIX}");
    {
        let mut output = storage.create_output(&staged)?;
        output.write_all(bytes)?;
        output.flush_and_sync()?;
        output.close()?;
    }
    storage.rename_file(&staged, name)
}

/// Write a set of files so that either all of them become visible or none do.
///
/// Each `(name, bytes)` pair is written to `name` + [`STAGING_SUFFIX`]. If any
/// write fails, the staged files written so far are deleted and the error is
/// returned. Only after every part is staged are they renamed into place.
pub fn commit_staged(storage: &dyn Storage, parts: &[(String, Vec<u8>)]) -> Result<()> {
    let mut staged = Vec::<String>::with_capacity(parts.len());

    for (name, bytes) in parts {
        let staged_name = format!("{name}{STAGING_SUFFIX}");
        let written = (|| -> Result<()> {
            let mut output = storage.create_output(&staged_name)?;
            output.write_all(bytes)?;
            output.flush_and_sync()?;
            output.close()
        })();

        if let Err(e) = written {
            for name in &staged {
                let _ = storage.delete_file(name);
            }
            let _ = storage.delete_file(&staged_name);
            return Err(e);
        }
        staged.push(staged_name);
    }

    for ((name, _), staged_name) in parts.iter().zip(staged.iter()) {
        storage.rename_file(staged_name, name)?;
    }
    storage.sync()
}

/// List the files that start with `prefix`, in lexicographic order, ignoring staged files.
pub fn list_with_prefix(storage: &dyn Storage, prefix: &str) -> Result<Vec<String>> {
    let mut files: Vec<String> = storage
        .list_files()?
        .into_iter()
        .filter(|name| name.starts_with(prefix) && !name.ends_with(STAGING_SUFFIX))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_and_read_all() {
        let storage = MemoryStorage::new();
        write_atomic(&storage, "state.json", b"{}").unwrap();

        assert!(storage.file_exists("state.json"));
        assert!(!storage.file_exists("state.json.staging"));
        assert_eq!(read_all(&storage, "state.json").unwrap(), b"{}");
    }

    #[test]
    fn test_commit_staged_makes_all_parts_visible() {
        let storage = MemoryStorage::new();
        let parts = vec![
            ("dups-00000.jsonl".to_string(), b"a".to_vec()),
            ("dups-00001.jsonl".to_string(), b"b".to_vec()),
        ];
        commit_staged(&storage, &parts).unwrap();

        let files = list_with_prefix(&storage, "dups-").unwrap();
        assert_eq!(files, vec!["dups-00000.jsonl", "dups-00001.jsonl"]);
    }

    #[test]
    fn test_commit_staged_replaces_existing_parts() {
        let storage = MemoryStorage::new();
        write_atomic(&storage, "dups-00000.jsonl", b"old").unwrap();

        let parts = vec![("dups-00000.jsonl".to_string(), b"new".to_vec())];
        commit_staged(&storage, &parts).unwrap();

        assert_eq!(read_all(&storage, "dups-00000.jsonl").unwrap(), b"new");
        let staged: Vec<String> = storage
            .list_files()
            .unwrap()
            .into_iter()
            .filter(|name| name.ends_with(STAGING_SUFFIX))
            .collect();
        assert!(staged.is_empty());
    }

    #[test]
    fn test_list_with_prefix_skips_staged_files() {
        let storage = MemoryStorage::new();
        let mut output = storage.create_output("dups-00000.jsonl.staging").unwrap();
        output.write_all(b"x").unwrap();
        output.close().unwrap();

        assert!(list_with_prefix(&storage, "dups-").unwrap().is_empty());
    }
}
