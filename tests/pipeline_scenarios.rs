mod common;

use std::collections::HashMap;
use std::sync::Arc;

use curator_dedup::config::DedupConfig;
use curator_dedup::document::{
    CorpusPartition, DEFAULT_TEXT_FIELD, DocumentRecord, FieldValue, read_jsonl_partition,
};
use curator_dedup::error::{DedupError, Result};
use curator_dedup::output::read_duplicate_ids;
use curator_dedup::pipeline::DedupPipeline;
use curator_dedup::semantic::KeepPolicy;
use curator_dedup::storage::{self, FileStorage, Storage, StorageConfig};

fn file_storage(dir: &std::path::Path) -> Result<Arc<dyn Storage>> {
    Ok(Arc::new(FileStorage::new(dir, StorageConfig::default())?))
}

fn put(storage: &dyn Storage, name: &str, lines: &[&str]) -> Result<()> {
    let mut content = lines.join("\n");
    content.push('\n');
    storage::write_atomic(storage, name, content.as_bytes())
}

const LONG: &str = "a long paragraph that is repeated almost verbatim in two shards of the corpus, \
                    long enough to produce plenty of character shingles for the fuzzy engine";

#[test]
fn test_jsonl_corpus_end_to_end() -> Result<()> {
    common::init_logging();
    let input_dir = tempfile::TempDir::new()?;
    let work_dir = tempfile::TempDir::new()?;
    let output_dir = tempfile::TempDir::new()?;
    let input = file_storage(input_dir.path())?;
    let work = file_storage(work_dir.path())?;
    let output = file_storage(output_dir.path())?;

    let near = LONG.replace("verbatim", "verbatin");
    put(
        input.as_ref(),
        "shard-0.jsonl",
        &[
            r#"{"text": "hello world", "lang": "en"}"#,
            format!(r#"{{"text": "{LONG}", "lang": "en"}}"#).as_str(),
        ],
    )?;
    put(
        input.as_ref(),
        "shard-1.jsonl",
        &[
            r#"{"text": "hello world", "lang": "en"}"#,
            format!(r#"{{"text": "{near}", "lang": "en"}}"#).as_str(),
            r#"{"text": "unique", "lang": "de"}"#,
        ],
    )?;

    let read_all = || -> Result<Vec<_>> {
        storage::list_with_prefix(input.as_ref(), "shard-")?
            .iter()
            .map(|name| read_jsonl_partition(input.as_ref(), name, DEFAULT_TEXT_FIELD, None))
            .collect()
    };

    let mut config = DedupConfig::default();
    config.fuzzy.char_ngrams = 5;
    let pipeline = DedupPipeline::new(config, work.clone())?;

    let mut corpus = read_all()?;
    let report = pipeline.identify(&mut corpus, None)?;
    // shard-0 gets ids 0..2, shard-1 gets 2..5.
    assert_eq!(report.exact, Some(1));
    assert_eq!(report.fuzzy, Some(2));
    assert_eq!(report.duplicate_ids.into_iter().collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(read_duplicate_ids(work.as_ref(), "duplicate_ids")?.len(), 2);

    // A later run reads the corpus again, without identifiers.
    let stats = pipeline.remove(read_all()?, output.as_ref())?;
    assert_eq!(stats.records_in, 5);
    assert_eq!(stats.records_removed, 2);

    let shard1 = read_jsonl_partition(
        output.as_ref(),
        "shard-1.jsonl",
        DEFAULT_TEXT_FIELD,
        Some("id"),
    )?;
    assert_eq!(shard1.ids().collect::<Vec<_>>(), vec![4]);
    assert_eq!(shard1.records[0].text, "unique");
    Ok(())
}

#[test]
fn test_changed_corpus_is_rejected_at_removal() -> Result<()> {
    let work_dir = tempfile::TempDir::new()?;
    let output_dir = tempfile::TempDir::new()?;
    let work = file_storage(work_dir.path())?;
    let output = file_storage(output_dir.path())?;

    let records = |texts: &[&str]| -> Vec<DocumentRecord> {
        texts.iter().map(|t| DocumentRecord::new(*t)).collect()
    };
    let pipeline = DedupPipeline::new(DedupConfig::default(), work)?;
    let mut corpus = vec![CorpusPartition::new("p", records(&["x", "x", "y"]))];
    pipeline.identify(&mut corpus, None)?;

    // One record was dropped upstream between identification and removal.
    let drifted = vec![CorpusPartition::new("p", records(&["x", "y"]))];
    let err = pipeline.remove(drifted, output.as_ref()).unwrap_err();
    assert!(matches!(err, DedupError::PartitionMismatch { .. }));
    assert!(output.list_files()?.is_empty());
    Ok(())
}

#[test]
fn test_semantic_with_metadata_ranked_keep() -> Result<()> {
    let work = tempfile::TempDir::new()?;
    let mut config = DedupConfig::from_json_str(
        r#"{
            "exact": { "enabled": false },
            "fuzzy": { "enabled": false },
            "semantic": {
                "enabled": true,
                "n_clusters": 1,
                "eps": 0.05,
                "which_to_keep": { "metadata_ranked": { "field": "quality", "descending": true } }
            }
        }"#,
    )?;
    config.identifiers.assign_ids = false;
    assert!(matches!(
        config.semantic.which_to_keep,
        KeepPolicy::MetadataRanked { .. }
    ));

    let record = |id: u64, quality: f64| {
        DocumentRecord::builder(format!("doc {id}"))
            .id(id)
            .field("quality", FieldValue::Float(quality))
            .build()
    };
    let mut corpus = vec![CorpusPartition::new(
        "p",
        vec![record(10, 0.1), record(11, 0.9), record(12, 0.5)],
    )];
    let embeddings = HashMap::from([
        (10, vec![1.0, 0.0]),
        (11, vec![1.0, 0.01]),
        (12, vec![0.0, 1.0]),
    ]);

    let pipeline = DedupPipeline::new(config, file_storage(work.path())?)?;
    let report = pipeline.identify(&mut corpus, Some(&embeddings))?;
    assert_eq!(report.duplicate_ids.into_iter().collect::<Vec<_>>(), vec![10]);
    assert_eq!(report.semantic.map(|s| s.kept.len()), Some(1));
    Ok(())
}
