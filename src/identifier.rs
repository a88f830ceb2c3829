//! Identifier assignment.
//!
//! Documents without a usable identifier get one from the identifier
//! service. Identifiers are handed out as contiguous ranges, one per corpus
//! partition, so a partition's record at position `p` always receives
//! `range.start + p`. Persisting the service state as a snapshot lets a later
//! removal run map `(partition, position)` back to the same identifiers.
//!
//! - [`IdGenerator`] is the owned state machine.
//! - [`IdentifierService`] runs a generator on a dedicated owner thread;
//!   callers talk to it through cloneable [`IdentifierHandle`]s, so
//!   concurrent assignments are serialized and can never overlap.
//! - [`SnapshotStore`] persists a checksummed, versioned snapshot.

pub mod generator;
pub mod service;
pub mod snapshot;

pub use generator::{IdGenerator, IdRange, IdentifierState, SNAPSHOT_VERSION};
pub use service::{IdentifierHandle, IdentifierService, assign_partition_ids};
pub use snapshot::SnapshotStore;
