//! JSON-lines adapter for corpus partitions.
//!
//! Each line is one JSON object:
//! ```jsonl
//! {"id": 0, "text": "The quick brown fox", "url": "https://a.example"}
//! {"id": 1, "text": "The quick brown fox", "url": "https://b.example"}
//! ```
//! The configured text field becomes [`DocumentRecord::text`], the optional
//! id field becomes [`DocumentRecord::id`], and everything else lands in
//! `fields`. Writing performs the inverse mapping.

use std::io::{BufRead, BufReader, Write};

use serde_json::{Map, Value};

use crate::document::field_value::FieldValue;
use crate::document::record::{CorpusPartition, DocumentRecord};
use crate::error::{DedupError, Result};
use crate::storage::Storage;

/// Read one JSON-lines file as a corpus partition keyed by the file name.
///
/// Blank lines are skipped. A line that is not an object, lacks the text
/// field, or carries a non-integer id is an error naming the line number.
pub fn read_jsonl_partition(
    storage: &dyn Storage,
    name: &str,
    text_field: &str,
    id_field: Option<&str>,
) -> Result<CorpusPartition> {
    let reader = BufReader::new(storage.open_input(name)?);
    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_line(&line, text_field, id_field).map_err(|e| {
            DedupError::other(format!("{name}:{}: {e}", line_num + 1))
        })?;
        records.push(record);
    }

    Ok(CorpusPartition::new(name, records))
}

fn parse_line(line: &str, text_field: &str, id_field: Option<&str>) -> Result<DocumentRecord> {
    let value: Value = serde_json::from_str(line)?;
    let Value::Object(mut map) = value else {
        return Err(DedupError::other("expected a JSON object"));
    };

    let text = match map.remove(text_field) {
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(DedupError::other(format!(
                "field '{text_field}' is not a string: {other}"
            )));
        }
        None => return Err(DedupError::other(format!("missing field '{text_field}'"))),
    };

    let id = match id_field.and_then(|f| map.remove(f)) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(
            n.as_u64()
                .ok_or_else(|| DedupError::other(format!("identifier {n} is not a u64")))?,
        ),
        Some(other) => {
            return Err(DedupError::other(format!(
                "identifier is not an integer: {other}"
            )));
        }
    };

    let fields = map
        .into_iter()
        .map(|(k, v)| (k, FieldValue::from(v)))
        .collect();

    Ok(DocumentRecord { id, text, fields })
}

/// Serialize records as JSON lines.
pub fn records_to_jsonl(
    records: &[DocumentRecord],
    text_field: &str,
    id_field: Option<&str>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for record in records {
        let mut map = Map::with_capacity(record.fields.len() + 2);
        // Sorted field order keeps output byte-stable across runs.
        let mut names: Vec<&String> = record.fields.keys().collect();
        names.sort();
        for name in names {
            map.insert(name.clone(), Value::from(&record.fields[name]));
        }
        map.insert(text_field.to_string(), Value::String(record.text.clone()));
        if let (Some(field), Some(id)) = (id_field, record.id) {
            map.insert(field.to_string(), Value::from(id));
        }
        serde_json::to_writer(&mut out, &Value::Object(map))?;
        out.write_all(b"\n")?;
    }
    Ok(out)
}

/// Write a partition as one JSON-lines file named `name`.
pub fn write_jsonl_partition(
    storage: &dyn Storage,
    name: &str,
    records: &[DocumentRecord],
    text_field: &str,
    id_field: Option<&str>,
) -> Result<()> {
    let bytes = records_to_jsonl(records, text_field, id_field)?;
    let mut output = storage.create_output(name)?;
    output.write_all(&bytes)?;
    output.flush_and_sync()?;
    output.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn put(storage: &MemoryStorage, name: &str, content: &str) {
        let mut output = storage.create_output(name).unwrap();
        output.write_all(content.as_bytes()).unwrap();
        output.close().unwrap();
    }

    #[test]
    fn test_read_partition() {
        let storage = MemoryStorage::new();
        put(
            &storage,
            "part-0.jsonl",
            "{\"doc_id\": 5, \"content\": \"hello\", \"lang\": \"en\"}\n\n{\"content\": \"world\"}\n",
        );

        let partition =
            read_jsonl_partition(&storage, "part-0.jsonl", "content", Some("doc_id")).unwrap();
        assert_eq!(partition.key, "part-0.jsonl");
        assert_eq!(partition.len(), 2);
        assert_eq!(partition.records[0].id, Some(5));
        assert_eq!(partition.records[0].text, "hello");
        assert_eq!(
            partition.records[0].get_field("lang"),
            Some(&FieldValue::Text("en".into()))
        );
        assert_eq!(partition.records[1].id, None);
    }

    #[test]
    fn test_read_reports_line_number() {
        let storage = MemoryStorage::new();
        put(&storage, "bad.jsonl", "{\"text\": \"ok\"}\n{\"body\": \"no text\"}\n");

        let err = read_jsonl_partition(&storage, "bad.jsonl", "text", None).unwrap_err();
        assert!(err.to_string().contains("bad.jsonl:2"));
    }

    #[test]
    fn test_write_then_read_keeps_schema() {
        let storage = MemoryStorage::new();
        let records = vec![
            DocumentRecord::builder("first")
                .id(10)
                .field("meta", FieldValue::Json(serde_json::json!({"k": [1]})))
                .build(),
        ];
        write_jsonl_partition(&storage, "out.jsonl", &records, "text", Some("id")).unwrap();

        let partition = read_jsonl_partition(&storage, "out.jsonl", "text", Some("id")).unwrap();
        assert_eq!(partition.records, records);
    }
}
