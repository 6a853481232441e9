//! Fuzzes CSV ingestion with arbitrary file bytes.
//!
//! Malformed CSV, ragged rows, binary garbage, and oversized cells must
//! all surface as errors (or succeed on valid input), never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relish::embedding::EmbeddingService;
use relish::{Config, Embedding, IngestOptions, Relish, Result};
use std::sync::OnceLock;
use tempfile::TempDir;

struct SeededEmbedding;

impl EmbeddingService for SeededEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let seed = text.bytes().map(u64::from).sum::<u64>() % 97;
        Ok((0..384)
            .map(|i| (seed as f32 * 0.1 + i as f32 * 0.01).sin())
            .collect())
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        384
    }
}

struct Harness {
    db: Relish,
    dir: TempDir,
}

fn harness() -> &'static Harness {
    static HARNESS: OnceLock<Harness> = OnceLock::new();
    HARNESS.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let db = Relish::open_with_embedding(
            dir.path().join("fuzz.db"),
            Config::default(),
            Box::new(SeededEmbedding),
        )
        .unwrap();
        Harness { db, dir }
    })
}

fuzz_target!(|data: &[u8]| {
    let harness = harness();
    let csv_path = harness.dir.path().join("input.csv");
    if std::fs::write(&csv_path, data).is_err() {
        return;
    }

    let options = IngestOptions {
        collection: Some("fuzz_corpus".to_string()),
        text_column: Some("Review Text".to_string()),
        chunking: None,
    };

    match harness.db.ingest_csv(&csv_path, options) {
        Ok(report) => {
            assert!(report.rows_skipped <= report.rows_read);
            let stored = harness
                .db
                .document_count(report.collection_id)
                .unwrap();
            assert_eq!(stored, report.documents_written);
        }
        Err(_) => {
            // Unreadable or column-less input is rejected cleanly.
        }
    }
});
