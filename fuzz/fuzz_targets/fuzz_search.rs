//! Fuzzes the search query path.
//!
//! Arbitrary query text plus arbitrary top_k/threshold values (including
//! NaN and infinities from raw bytes) must never panic. Successful
//! searches must uphold the ordering and size invariants.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relish::embedding::EmbeddingService;
use relish::{Config, Embedding, NewDocument, Relish, Result, SearchOptions};
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
    _dir: TempDir,
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
        let collection_id = db.create_collection("restaurant_reviews").unwrap();
        let service = SeededEmbedding;
        for seed in 0..16u64 {
            let text = format!("seeded review {}", seed);
            let embedding = service.embed(&text).unwrap();
            db.add_document(NewDocument {
                collection_id,
                text,
                embedding: Some(embedding),
                ..Default::default()
            })
            .unwrap();
        }
        Harness { db, _dir: dir }
    })
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }

    // First byte drives top_k (zero included, which must be rejected
    // cleanly); the next four are reinterpreted as an f32 threshold so
    // NaN and infinities get exercised.
    let top_k = usize::from(data[0] % 24);
    let threshold = f32::from_le_bytes([data[1], data[2], data[3], data[4]]);
    let query = String::from_utf8_lossy(&data[5..]);

    let options = SearchOptions {
        top_k: Some(top_k),
        threshold: Some(threshold),
    };

    match harness().db.search(&query, options) {
        Ok(results) => {
            assert!(results.len() <= top_k);
            for window in results.windows(2) {
                assert!(window[0].distance <= window[1].distance);
            }
            for result in &results {
                assert!(!result.text.is_empty());
            }
        }
        Err(_) => {
            // Empty queries and zero top_k are rejected; that is the
            // contract, not a crash.
        }
    }
});
