//! Duplicate-ID set persistence.
//!
//! The engines' only persisted output is the set of identifiers to remove.
//! It is written as JSON lines (`{"id": 17}`) split into numbered parts
//! named `{prefix}-{part:05}.jsonl`.

use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};

use log::info;
use serde::{Deserialize, Serialize};

use crate::Identifier;
use crate::config::OutputConfig;
use crate::error::{DedupError, Result};
use crate::storage::{self, Storage};

#[derive(Debug, Serialize, Deserialize)]
struct IdLine {
    id: Identifier,
}

fn part_name(prefix: &str, part: usize) -> String {
    format!("{prefix}-{part:05}.jsonl")
}

/// Writes duplicate-ID sets as partitioned JSON lines.
#[derive(Debug, Clone)]
pub struct DuplicateIdWriter {
    prefix: String,
    rows_per_file: usize,
}

impl DuplicateIdWriter {
    /// Create a writer.
    pub fn new<S: Into<String>>(prefix: S, rows_per_file: usize) -> Result<Self> {
        let config = OutputConfig {
            duplicate_id_prefix: prefix.into(),
            rows_per_file,
        };
        Self::from_config(&config)
    }

    /// Create a writer from the output section of the configuration.
    pub fn from_config(config: &OutputConfig) -> Result<Self> {
        config.validate()?;
        Ok(DuplicateIdWriter {
            prefix: config.duplicate_id_prefix.clone(),
            rows_per_file: config.rows_per_file,
        })
    }

    /// File name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Write `ids` in ascending order and return the part names.
    ///
    /// Parts are committed together. Parts of an earlier, larger set under the
    /// same prefix are deleted afterwards so a reader only sees this set. An
    /// empty set writes no parts.
    pub fn write(&self, storage: &dyn Storage, ids: &BTreeSet<Identifier>) -> Result<Vec<String>> {
        let ordered: Vec<Identifier> = ids.iter().copied().collect();
        let mut parts = Vec::with_capacity(ordered.len().div_ceil(self.rows_per_file));

        for (part, chunk) in ordered.chunks(self.rows_per_file).enumerate() {
            let mut bytes = Vec::with_capacity(chunk.len() * 16);
            for &id in chunk {
                serde_json::to_writer(&mut bytes, &IdLine { id })?;
                bytes.push(b'\n');
            }
            parts.push((part_name(&self.prefix, part), bytes));
        }

        let stale: Vec<String> = storage::list_with_prefix(storage, &format!("{}-", self.prefix))?
            .into_iter()
            .filter(|name| !parts.iter().any(|(part, _)| part == name))
            .collect();

        storage::commit_staged(storage, &parts)?;
        for name in &stale {
            storage.delete_file(name)?;
        }

        info!(
            "wrote {} duplicate identifiers in {} parts with prefix '{}'",
            ids.len(),
            parts.len(),
            self.prefix
        );
        Ok(parts.into_iter().map(|(name, _)| name).collect())
    }
}

/// Read every part written under `prefix` back into one set.
pub fn read_duplicate_ids(storage: &dyn Storage, prefix: &str) -> Result<BTreeSet<Identifier>> {
    let mut ids = BTreeSet::new();

    for name in storage::list_with_prefix(storage, &format!("{prefix}-"))? {
        let reader = BufReader::new(storage.open_input(&name)?);
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: IdLine = serde_json::from_str(&line).map_err(|e| {
                DedupError::corrupted(format!("{name}:{}: {e}", line_num + 1))
            })?;
            ids.insert(parsed.id);
        }
    }

    Ok(ids)
}
