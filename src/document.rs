//! Document records consumed by the matching engines.
//!
//! A [`DocumentRecord`] carries an optional identifier, the text used for
//! matching, and any remaining fields. Records are grouped into
//! [`CorpusPartition`]s, one per logical batch (typically one source file),
//! because identifiers are assigned per partition.
//!
//! # Examples
//!
//! ```
//! use curator_dedup::document::{DocumentRecord, FieldValue};
//!
//! let record = DocumentRecord::builder("the quick brown fox")
//!     .id(7)
//!     .field("url", FieldValue::Text("https://example.com".into()))
//!     .build();
//!
//! assert_eq!(record.id, Some(7));
//! assert_eq!(record.text_for("text"), Some("the quick brown fox"));
//! assert_eq!(record.text_for("url"), Some("https://example.com"));
//! ```

pub mod field_value;
pub mod jsonl;
pub mod record;

pub use field_value::FieldValue;
pub use jsonl::{read_jsonl_partition, records_to_jsonl, write_jsonl_partition};
pub use record::{CorpusPartition, DEFAULT_TEXT_FIELD, DocumentRecord, DocumentRecordBuilder};
