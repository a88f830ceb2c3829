//! Persisted identifier snapshots.
//!
//! The snapshot is a JSON envelope around [`IdentifierState`] with a
//! format version, a creation timestamp, and a CRC32 of the serialized
//! state. It is written through a staging file and renamed into place, so a
//! crash mid-write leaves the previous snapshot intact.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{DedupError, Result};
use crate::identifier::generator::{IdentifierState, SNAPSHOT_VERSION};
use crate::storage::{self, Storage};

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: u32,
    created_at: DateTime<Utc>,
    checksum: u32,
    state: IdentifierState,
}

fn checksum(state: &IdentifierState) -> Result<u32> {
    let bytes = serde_json::to_vec(state)?;
    Ok(crc32fast::hash(&bytes))
}

/// Reads and writes identifier snapshots in a [`Storage`].
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    storage: Arc<dyn Storage>,
    name: String,
}

impl SnapshotStore {
    /// Create a store for the snapshot file `name`.
    pub fn new<S: Into<String>>(storage: Arc<dyn Storage>, name: S) -> Self {
        SnapshotStore {
            storage,
            name: name.into(),
        }
    }

    /// Name of the snapshot file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a snapshot has been written.
    pub fn exists(&self) -> bool {
        self.storage.file_exists(&self.name)
    }

    /// Persist `state`, replacing any previous snapshot atomically.
    pub fn save(&self, state: &IdentifierState) -> Result<()> {
        state.validate()?;
        let envelope = SnapshotEnvelope {
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            checksum: checksum(state)?,
            state: state.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        storage::write_atomic(self.storage.as_ref(), &self.name, &bytes)?;

        info!(
            "saved identifier snapshot '{}' (next_id={}, {} partitions)",
            self.name,
            state.next_id,
            state.assigned_ranges.len()
        );
        Ok(())
    }

    /// Load the snapshot.
    ///
    /// Fails with [`DedupError::MissingSnapshot`] if none was written and with
    /// [`DedupError::Corrupted`] on a version or checksum mismatch.
    pub fn load(&self) -> Result<IdentifierState> {
        if !self.exists() {
            return Err(DedupError::MissingSnapshot(self.name.clone()));
        }

        let bytes = storage::read_all(self.storage.as_ref(), &self.name)?;
        let envelope: SnapshotEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| DedupError::corrupted(format!("snapshot '{}': {e}", self.name)))?;

        if envelope.version != SNAPSHOT_VERSION {
            return Err(DedupError::corrupted(format!(
                "snapshot '{}' has version {}, expected {SNAPSHOT_VERSION}",
                self.name, envelope.version
            )));
        }
        if checksum(&envelope.state)? != envelope.checksum {
            return Err(DedupError::corrupted(format!(
                "snapshot '{}' failed checksum verification",
                self.name
            )));
        }
        envelope.state.validate()?;
        Ok(envelope.state)
    }

    /// Load the snapshot, or start from an empty state if none exists yet.
    pub fn load_or_default(&self) -> Result<IdentifierState> {
        match self.load() {
            Err(DedupError::MissingSnapshot(_)) => Ok(IdentifierState::default()),
            other => other,
        }
    }
}
