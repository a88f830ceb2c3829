//! Range-based identifier generator and its serializable state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Identifier;
use crate::error::{DedupError, Result};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A half-open identifier range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRange {
    /// First identifier of the range.
    pub start: Identifier,
    /// One past the last identifier.
    pub end: Identifier,
}

impl IdRange {
    /// Number of identifiers in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `id` lies in the range.
    pub fn contains(&self, id: Identifier) -> bool {
        self.start <= id && id < self.end
    }

    /// Whether two ranges share an identifier.
    pub fn overlaps(&self, other: &IdRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    /// Identifier at `position` within the range.
    pub fn at(&self, position: u64) -> Option<Identifier> {
        (position < self.len()).then(|| self.start + position)
    }
}

/// Serializable state of an [`IdGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierState {
    /// Snapshot format version.
    pub version: u32,
    /// Next identifier to hand out.
    pub next_id: Identifier,
    /// Range assigned to each partition key.
    pub assigned_ranges: BTreeMap<String, IdRange>,
}

impl Default for IdentifierState {
    fn default() -> Self {
        IdentifierState {
            version: SNAPSHOT_VERSION,
            next_id: 0,
            assigned_ranges: BTreeMap::new(),
        }
    }
}

impl IdentifierState {
    /// Check internal consistency: supported version, ranges below
    /// `next_id`, and no two ranges overlapping.
    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(DedupError::corrupted(format!(
                "unsupported identifier snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }

        let mut ranges: Vec<(&String, &IdRange)> = self.assigned_ranges.iter().collect();
        ranges.sort_by_key(|(_, range)| range.start);

        for (key, range) in &ranges {
            if range.start > range.end || range.end > self.next_id {
                return Err(DedupError::corrupted(format!(
                    "range [{}, {}) of '{key}' is inconsistent with next_id {}",
                    range.start, range.end, self.next_id
                )));
            }
        }
        for pair in ranges.windows(2) {
            let (key_a, a) = pair[0];
            let (key_b, b) = pair[1];
            if a.overlaps(b) {
                return Err(DedupError::corrupted(format!(
                    "ranges of '{key_a}' and '{key_b}' overlap"
                )));
            }
        }
        Ok(())
    }

    /// Range assigned to `partition`, if any.
    pub fn range(&self, partition: &str) -> Option<IdRange> {
        self.assigned_ranges.get(partition).copied()
    }

    /// Identifier of the record at `position` of `partition`.
    pub fn resolve(&self, partition: &str, position: u64) -> Result<Identifier> {
        let range = self.range(partition).ok_or_else(|| {
            DedupError::partition_mismatch(partition, "no identifier range was assigned")
        })?;
        range.at(position).ok_or_else(|| {
            DedupError::partition_mismatch(
                partition,
                format!(
                    "position {position} is outside the assigned range of {} records",
                    range.len()
                ),
            )
        })
    }

    /// Partition key and position that own `id`.
    pub fn locate(&self, id: Identifier) -> Option<(&str, u64)> {
        self.assigned_ranges
            .iter()
            .find(|(_, range)| range.contains(id))
            .map(|(key, range)| (key.as_str(), id - range.start))
    }
}

/// Owned identifier generator.
///
/// Not `Clone`: a generator must have exactly one owner per run so that no
/// two copies hand out the same identifiers. Share it through
/// [`IdentifierService`](crate::identifier::IdentifierService).
#[derive(Debug, Default)]
pub struct IdGenerator {
    state: IdentifierState,
}

impl IdGenerator {
    /// Create a generator starting at identifier 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator from a previously taken snapshot.
    pub fn restore(state: IdentifierState) -> Result<Self> {
        state.validate()?;
        Ok(IdGenerator { state })
    }

    /// Reserve `count` identifiers for `partition`.
    ///
    /// Assigning a key that already has a range fails with
    /// [`DedupError::RangeConflict`] unless `overwrite` is set, in which case
    /// a fresh range replaces the old one. Ranges are never reused.
    pub fn assign(&mut self, partition: &str, count: u64, overwrite: bool) -> Result<IdRange> {
        if !overwrite && self.state.assigned_ranges.contains_key(partition) {
            return Err(DedupError::RangeConflict {
                partition: partition.to_string(),
            });
        }

        let start = self.state.next_id;
        let end = start.checked_add(count).ok_or_else(|| {
            DedupError::other(format!(
                "identifier space exhausted assigning {count} ids to '{partition}'"
            ))
        })?;

        let range = IdRange { start, end };
        self.state.next_id = end;
        self.state
            .assigned_ranges
            .insert(partition.to_string(), range);
        Ok(range)
    }

    /// See [`IdentifierState::resolve`].
    pub fn resolve(&self, partition: &str, position: u64) -> Result<Identifier> {
        self.state.resolve(partition, position)
    }

    /// See [`IdentifierState::locate`].
    pub fn locate(&self, id: Identifier) -> Option<(&str, u64)> {
        self.state.locate(id)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> IdentifierState {
        self.state.clone()
    }

    /// Next identifier that would be handed out.
    pub fn next_id(&self) -> Identifier {
        self.state.next_id
    }

    /// Consume the generator, returning its state.
    pub fn into_state(self) -> IdentifierState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_contiguous_ranges() {
        let mut generator = IdGenerator::new();
        let a = generator.assign("a.jsonl", 3, false).unwrap();
        let b = generator.assign("b.jsonl", 2, false).unwrap();

        assert_eq!(a, IdRange { start: 0, end: 3 });
        assert_eq!(b, IdRange { start: 3, end: 5 });
        assert!(!a.overlaps(&b));
        assert_eq!(generator.next_id(), 5);
    }

    #[test]
    fn test_range_conflict_without_overwrite() {
        let mut generator = IdGenerator::new();
        generator.assign("a", 3, false).unwrap();

        let err = generator.assign("a", 3, false).unwrap_err();
        assert!(matches!(err, DedupError::RangeConflict { ref partition } if partition == "a"));

        let fresh = generator.assign("a", 3, true).unwrap();
        assert_eq!(fresh, IdRange { start: 3, end: 6 });
        assert_eq!(generator.resolve("a", 0).unwrap(), 3);
    }

    #[test]
    fn test_empty_partition() {
        let mut generator = IdGenerator::new();
        let range = generator.assign("empty", 0, false).unwrap();
        assert!(range.is_empty());
        let next = generator.assign("next", 1, false).unwrap();
        assert!(!range.overlaps(&next));
    }

    #[test]
    fn test_resolve_and_locate() {
        let mut generator = IdGenerator::new();
        generator.assign("a", 2, false).unwrap();
        generator.assign("b", 2, false).unwrap();
        let state = generator.snapshot();

        assert_eq!(state.resolve("b", 1).unwrap(), 3);
        assert!(state.resolve("b", 2).is_err());
        assert!(state.resolve("c", 0).is_err());
        assert_eq!(state.locate(2), Some(("b", 0)));
        assert_eq!(state.locate(4), None);
        assert_eq!(generator.locate(1), Some(("a", 1)));
    }

    #[test]
    fn test_restore_rejects_overlapping_ranges() {
        let mut state = IdentifierState {
            next_id: 10,
            ..Default::default()
        };
        state
            .assigned_ranges
            .insert("a".into(), IdRange { start: 0, end: 6 });
        state
            .assigned_ranges
            .insert("b".into(), IdRange { start: 5, end: 10 });
        assert!(IdGenerator::restore(state).is_err());
    }

    #[test]
    fn test_restore_rejects_ranges_past_next_id() {
        let mut state = IdentifierState::default();
        state
            .assigned_ranges
            .insert("a".into(), IdRange { start: 0, end: 6 });
        assert!(IdGenerator::restore(state).is_err());
    }

    #[test]
    fn test_restore_continues_after_snapshot() {
        let mut generator = IdGenerator::new();
        let first = generator.assign("a", 100, false).unwrap();

        let mut restored = IdGenerator::restore(generator.snapshot()).unwrap();
        let second = restored.assign("b", 50, false).unwrap();
        assert!(!first.overlaps(&second));
        assert_eq!(second.start, 100);
    }
}
