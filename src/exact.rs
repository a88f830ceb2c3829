//! Exact duplicate detection.
//!
//! Every document's designated text is hashed to a 128-bit xxh3 digest.
//! Documents sharing a digest form a duplicate group; the lowest identifier
//! of each group is kept and the rest are reported. Digest collisions are
//! accepted as duplicates.

use std::collections::BTreeSet;

use ahash::AHashMap;
use log::info;
use rayon::prelude::*;
use xxhash_rust::xxh3::xxh3_128;

use crate::Identifier;
use crate::config::ExactConfig;
use crate::document::DocumentRecord;
use crate::error::{DedupError, Result};

/// A group of documents with identical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactGroup {
    /// Shared 128-bit digest.
    pub digest: u128,
    /// Identifier that survives.
    pub kept: Identifier,
    /// Identifiers marked for removal, ascending.
    pub removed: Vec<Identifier>,
}

/// Exact-match engine.
#[derive(Debug, Clone)]
pub struct ExactMatchEngine {
    config: ExactConfig,
}

impl ExactMatchEngine {
    /// Create a new engine.
    pub fn new(config: ExactConfig) -> Result<Self> {
        config.validate()?;
        Ok(ExactMatchEngine { config })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &ExactConfig {
        &self.config
    }

    /// Digest of one text.
    pub fn digest(&self, text: &str) -> u128 {
        if self.config.normalize {
            let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
            xxh3_128(normalized.as_bytes())
        } else {
            xxh3_128(text.as_bytes())
        }
    }

    fn digests(&self, documents: &[DocumentRecord]) -> Result<Vec<(u128, Identifier)>> {
        let field = self.config.text_field.as_str();
        documents
            .par_iter()
            .enumerate()
            .map(|(position, doc)| -> Result<(u128, Identifier)> {
                let id = doc.id.ok_or(DedupError::MissingIdentifier { position })?;
                let text = doc.text_for(field).ok_or_else(|| {
                    DedupError::invalid_config(format!(
                        "document {id} has no text field '{field}'"
                    ))
                })?;
                Ok((self.digest(text), id))
            })
            .collect()
    }

    /// All groups with more than one member, ordered by kept identifier.
    pub fn identify_groups(&self, documents: &[DocumentRecord]) -> Result<Vec<ExactGroup>> {
        let digests = self.digests(documents)?;

        let mut by_digest: AHashMap<u128, Vec<Identifier>> = AHashMap::new();
        for (digest, id) in digests {
            by_digest.entry(digest).or_default().push(id);
        }

        let mut groups: Vec<ExactGroup> = by_digest
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(digest, mut ids)| {
                ids.sort_unstable();
                ids.dedup();
                let kept = ids[0];
                ExactGroup {
                    digest,
                    kept,
                    removed: ids[1..].to_vec(),
                }
            })
            .filter(|group| !group.removed.is_empty())
            .collect();
        groups.sort_unstable_by_key(|group| group.kept);
        Ok(groups)
    }

    /// Identifiers to remove.
    pub fn identify(&self, documents: &[DocumentRecord]) -> Result<BTreeSet<Identifier>> {
        let groups = self.identify_groups(documents)?;
        let duplicates: BTreeSet<Identifier> = groups
            .iter()
            .flat_map(|group| group.removed.iter().copied())
            .collect();

        info!(
            "exact match: {} documents, {} duplicate groups, {} to remove",
            documents.len(),
            groups.len(),
            duplicates.len()
        );
        Ok(duplicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldValue;

    fn engine() -> ExactMatchEngine {
        ExactMatchEngine::new(ExactConfig::default()).unwrap()
    }

    #[test]
    fn test_keeps_lowest_identifier() {
        let docs = vec![
            DocumentRecord::with_id(9, "same"),
            DocumentRecord::with_id(4, "same"),
            DocumentRecord::with_id(6, "same"),
            DocumentRecord::with_id(1, "other"),
        ];
        let groups = engine().identify_groups(&docs).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kept, 4);
        assert_eq!(groups[0].removed, vec![6, 9]);
    }

    #[test]
    fn test_no_duplicates_is_empty_result() {
        let docs = vec![
            DocumentRecord::with_id(1, "a"),
            DocumentRecord::with_id(2, "b"),
        ];
        assert!(engine().identify(&docs).unwrap().is_empty());
        assert!(engine().identify(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_identifier() {
        let docs = vec![DocumentRecord::with_id(1, "a"), DocumentRecord::new("a")];
        let err = engine().identify(&docs).unwrap_err();
        assert!(matches!(err, DedupError::MissingIdentifier { position: 1 }));
    }

    #[test]
    fn test_designated_text_field() {
        let config = ExactConfig {
            text_field: "title".to_string(),
            ..Default::default()
        };
        let engine = ExactMatchEngine::new(config).unwrap();
        let docs = vec![
            DocumentRecord::builder("body one")
                .id(1)
                .field("title", FieldValue::Text("T".into()))
                .build(),
            DocumentRecord::builder("body two")
                .id(2)
                .field("title", FieldValue::Text("T".into()))
                .build(),
        ];
        assert_eq!(engine.identify(&docs).unwrap(), BTreeSet::from([2]));

        let missing = vec![DocumentRecord::with_id(3, "no title")];
        assert!(engine.identify(&missing).unwrap_err().is_configuration());
    }

    #[test]
    fn test_normalization() {
        let docs = vec![
            DocumentRecord::with_id(1, "hello   world"),
            DocumentRecord::with_id(2, " hello world\n"),
        ];
        assert!(engine().identify(&docs).unwrap().is_empty());

        let normalizing = ExactMatchEngine::new(ExactConfig {
            normalize: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(normalizing.identify(&docs).unwrap(), BTreeSet::from([2]));
    }
}
