//! Document record and corpus partition types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Identifier;
use crate::document::field_value::FieldValue;

/// Name under which [`DocumentRecord::text`] is addressed.
pub const DEFAULT_TEXT_FIELD: &str = "text";

/// A single corpus record.
///
/// Produced by an upstream reader and consumed read-only by the matching
/// engines. `id` is `None` until an identifier has been assigned or read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Identifier, if one is known.
    pub id: Option<Identifier>,
    /// The primary text of the record.
    pub text: String,
    /// All other fields.
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl DocumentRecord {
    /// Create a record without identifier or extra fields.
    pub fn new<S: Into<String>>(text: S) -> Self {
        DocumentRecord {
            id: None,
            text: text.into(),
            fields: HashMap::new(),
        }
    }

    /// Create a record with an identifier.
    pub fn with_id<S: Into<String>>(id: Identifier, text: S) -> Self {
        DocumentRecord {
            id: Some(id),
            text: text.into(),
            fields: HashMap::new(),
        }
    }

    /// Create a builder for constructing records.
    pub fn builder<S: Into<String>>(text: S) -> DocumentRecordBuilder {
        DocumentRecordBuilder {
            record: DocumentRecord::new(text),
        }
    }

    /// The text designated by `field`.
    ///
    /// [`DEFAULT_TEXT_FIELD`] addresses `text`; any other name addresses a
    /// text-valued entry of `fields`.
    pub fn text_for(&self, field: &str) -> Option<&str> {
        if field == DEFAULT_TEXT_FIELD {
            Some(&self.text)
        } else {
            self.fields.get(field).and_then(FieldValue::as_text)
        }
    }

    /// Get a field value.
    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// A builder for constructing records in a fluent manner.
#[derive(Debug)]
pub struct DocumentRecordBuilder {
    record: DocumentRecord,
}

impl DocumentRecordBuilder {
    /// Set the identifier.
    pub fn id(mut self, id: Identifier) -> Self {
        self.record.id = Some(id);
        self
    }

    /// Add a field.
    pub fn field<S: Into<String>>(mut self, name: S, value: FieldValue) -> Self {
        self.record.fields.insert(name.into(), value);
        self
    }

    /// Build the final record.
    pub fn build(self) -> DocumentRecord {
        self.record
    }
}

/// An ordered batch of records sharing one identifier range.
///
/// `key` names the batch (for example the source file name). The position of
/// a record inside `records` is what ties it to its auto-assigned identifier,
/// so partitions must be replayed in the same order for removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusPartition {
    /// Partition key.
    pub key: String,
    /// Records in their original order.
    pub records: Vec<DocumentRecord>,
}

impl CorpusPartition {
    /// Create a new partition.
    pub fn new<S: Into<String>>(key: S, records: Vec<DocumentRecord>) -> Self {
        CorpusPartition {
            key: key.into(),
            records,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the partition has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the identifiers present on the records.
    pub fn ids(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.records.iter().filter_map(|r| r.id)
    }
}
