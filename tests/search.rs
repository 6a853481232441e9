//! Integration tests for the search pipeline.
//!
//! Tests the full stack: query validation, embedding, HNSW lookup,
//! record hydration, scoring, threshold filtering, and display rounding.
//! Documents are stored with hand-built unit vectors at known angles so
//! cosine distances (and therefore similarity scores) are exact.

use std::collections::HashMap;

use relish::embedding::EmbeddingService;
use relish::{
    similarity_from_distance, CollectionId, Config, Embedding, MetadataValue, NewDocument, Relish,
    Result, SearchOptions,
};
use tempfile::tempdir;

/// Default embedding dimension for tests (D384).
const DIM: usize = 384;

/// Unit vector along one axis.
fn axis(i: usize) -> Embedding {
    let mut v = vec![0.0f32; DIM];
    v[i] = 1.0;
    v
}

/// Unit vector rotated by `theta` radians in the (axis 0, axis 1) plane.
/// Cosine distance to `axis(0)` is exactly `1 - cos(theta)`.
fn rotated(theta: f32) -> Embedding {
    let mut v = vec![0.0f32; DIM];
    v[0] = theta.cos();
    v[1] = theta.sin();
    v
}

/// Test embedder: every query maps to the same fixed vector.
struct FixedQueryEmbedding {
    vector: Embedding,
}

impl EmbeddingService for FixedQueryEmbedding {
    fn embed(&self, _text: &str) -> Result<Embedding> {
        Ok(self.vector.clone())
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }

    fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Helper: open a database whose query embedder always returns `axis(0)`.
fn open_db() -> (Relish, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db = Relish::open_with_embedding(
        dir.path().join("test.db"),
        Config::default(),
        Box::new(FixedQueryEmbedding { vector: axis(0) }),
    )
    .unwrap();
    (db, dir)
}

fn add_doc(db: &Relish, collection_id: CollectionId, text: &str, embedding: Embedding) {
    db.add_document(NewDocument {
        collection_id,
        text: text.to_string(),
        embedding: Some(embedding),
        ..Default::default()
    })
    .unwrap();
}

/// Helper: seed the default collection with three documents at known
/// distances from the query vector: 0.0, 0.5, and 1.0.
fn seed_graded_corpus(db: &Relish) -> CollectionId {
    let collection_id = db.create_collection("restaurant_reviews").unwrap();
    add_doc(db, collection_id, "identical", rotated(0.0));
    add_doc(
        db,
        collection_id,
        "sixty degrees",
        rotated(std::f32::consts::FRAC_PI_3),
    );
    add_doc(db, collection_id, "orthogonal", axis(1));
    collection_id
}

// ============================================================================
// Scoring and Ordering
// ============================================================================

#[test]
fn test_search_scores_and_orders_results() {
    let (db, _dir) = open_db();
    seed_graded_corpus(&db);

    let results = db.search("anything", SearchOptions::default()).unwrap();

    // Default threshold 0.5: all three qualify (similarities 1.0,
    // 0.6667, 0.5), ordered by ascending distance.
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].text, "identical");
    assert_eq!(results[1].text, "sixty degrees");
    assert_eq!(results[2].text, "orthogonal");

    // Scores and distances are exact after display rounding
    assert_eq!(results[0].similarity, 1.0);
    assert_eq!(results[0].distance, 0.0);
    assert_eq!(results[1].similarity, 0.6667);
    assert_eq!(results[1].distance, 0.5);
    assert_eq!(results[2].similarity, 0.5);
    assert_eq!(results[2].distance, 1.0);

    db.close().unwrap();
}

#[test]
fn test_search_results_sorted_by_distance() {
    let (db, _dir) = open_db();
    let collection_id = db.create_collection("restaurant_reviews").unwrap();
    for i in 0..10 {
        add_doc(
            &db,
            collection_id,
            &format!("doc {}", i),
            rotated(0.1 * i as f32),
        );
    }

    let results = db
        .search(
            "anything",
            SearchOptions {
                threshold: Some(0.0),
                ..Default::default()
            },
        )
        .unwrap();

    for window in results.windows(2) {
        assert!(
            window[0].distance <= window[1].distance,
            "Results not sorted by distance: {} > {}",
            window[0].distance,
            window[1].distance,
        );
        assert!(window[0].similarity >= window[1].similarity);
    }

    db.close().unwrap();
}

// ============================================================================
// top_k
// ============================================================================

#[test]
fn test_search_respects_top_k() {
    let (db, _dir) = open_db();
    let collection_id = db.create_collection("restaurant_reviews").unwrap();
    for i in 0..10 {
        add_doc(
            &db,
            collection_id,
            &format!("doc {}", i),
            rotated(0.1 * i as f32),
        );
    }

    let results = db
        .search(
            "anything",
            SearchOptions {
                top_k: Some(3),
                threshold: Some(0.0),
            },
        )
        .unwrap();
    assert_eq!(results.len(), 3);

    db.close().unwrap();
}

#[test]
fn test_search_default_top_k_is_five() {
    let (db, _dir) = open_db();
    let collection_id = db.create_collection("restaurant_reviews").unwrap();
    for i in 0..10 {
        add_doc(
            &db,
            collection_id,
            &format!("doc {}", i),
            rotated(0.05 * i as f32),
        );
    }

    let results = db.search("anything", SearchOptions::default()).unwrap();
    assert_eq!(results.len(), 5);

    db.close().unwrap();
}

#[test]
fn test_search_top_k_beyond_corpus_size() {
    let (db, _dir) = open_db();
    seed_graded_corpus(&db);

    let results = db
        .search(
            "anything",
            SearchOptions {
                top_k: Some(50),
                threshold: Some(0.0),
            },
        )
        .unwrap();
    assert_eq!(results.len(), 3, "At most the whole corpus comes back");

    db.close().unwrap();
}

// ============================================================================
// Threshold
// ============================================================================

#[test]
fn test_search_threshold_override_filters() {
    let (db, _dir) = open_db();
    seed_graded_corpus(&db);

    let results = db
        .search(
            "anything",
            SearchOptions {
                threshold: Some(0.9),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "identical");

    db.close().unwrap();
}

#[test]
fn test_search_zero_threshold_keeps_everything() {
    let (db, _dir) = open_db();
    seed_graded_corpus(&db);

    let results = db
        .search(
            "anything",
            SearchOptions {
                threshold: Some(0.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(results.len(), 3);

    db.close().unwrap();
}

#[test]
fn test_search_boundary_score_passes_threshold() {
    let (db, _dir) = open_db();
    let collection_id = db.create_collection("restaurant_reviews").unwrap();
    // Orthogonal vector: distance 1.0, similarity exactly 0.5
    add_doc(&db, collection_id, "boundary", axis(1));

    let results = db.search("anything", SearchOptions::default()).unwrap();
    assert_eq!(results.len(), 1, "similarity == threshold is kept");
    assert_eq!(results[0].similarity, 0.5);

    db.close().unwrap();
}

#[test]
fn test_search_empty_result_is_ok() {
    let (db, _dir) = open_db();
    let collection_id = db.create_collection("restaurant_reviews").unwrap();
    // Opposite direction: distance 2.0, similarity 1/3
    let mut opposite = vec![0.0f32; DIM];
    opposite[0] = -1.0;
    add_doc(&db, collection_id, "opposite", opposite);

    let results = db.search("anything", SearchOptions::default()).unwrap();
    assert!(results.is_empty(), "Below-threshold matches are dropped");

    db.close().unwrap();
}

#[test]
fn test_search_empty_collection_returns_empty() {
    let (db, _dir) = open_db();
    db.create_collection("restaurant_reviews").unwrap();

    let results = db.search("anything", SearchOptions::default()).unwrap();
    assert!(results.is_empty());

    db.close().unwrap();
}

// ============================================================================
// Validation Errors
// ============================================================================

#[test]
fn test_search_empty_query_rejected() {
    let (db, _dir) = open_db();
    seed_graded_corpus(&db);

    for query in ["", "   ", "\t\n "] {
        let err = db.search(query, SearchOptions::default()).unwrap_err();
        assert!(err.is_invalid_query(), "query {:?} must be invalid", query);
        assert!(err.to_string().contains("Invalid query"));
    }

    db.close().unwrap();
}

#[test]
fn test_search_zero_top_k_rejected() {
    let (db, _dir) = open_db();
    seed_graded_corpus(&db);

    let err = db
        .search(
            "valid query",
            SearchOptions {
                top_k: Some(0),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(err.is_invalid_query());

    db.close().unwrap();
}

#[test]
fn test_search_oversize_top_k_rejected() {
    let (db, _dir) = open_db();
    seed_graded_corpus(&db);

    let err = db
        .search(
            "valid query",
            SearchOptions {
                top_k: Some(1001),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(err.is_invalid_query());

    // The cap itself is a legal request
    let results = db
        .search(
            "valid query",
            SearchOptions {
                top_k: Some(1000),
                threshold: Some(0.0),
            },
        )
        .unwrap();
    assert_eq!(results.len(), 3);

    db.close().unwrap();
}

// ============================================================================
// Retrieval Errors
// ============================================================================

#[test]
fn test_search_unknown_collection_is_retrieval_error() {
    let (db, _dir) = open_db();

    let err = db
        .search_collection("no-such-collection", "anything", SearchOptions::default())
        .unwrap_err();
    assert!(err.is_retrieval());
    assert!(err.to_string().contains("Retrieval failure"));

    db.close().unwrap();
}

#[test]
fn test_search_without_embedder_is_retrieval_error() {
    let dir = tempdir().unwrap();
    // Stock External provider cannot embed query text
    let db = Relish::open(dir.path().join("test.db"), Config::default()).unwrap();
    db.create_collection("restaurant_reviews").unwrap();

    let err = db.search("anything", SearchOptions::default()).unwrap_err();
    assert!(err.is_retrieval());

    db.close().unwrap();
}

// ============================================================================
// Named Collection Search
// ============================================================================

#[test]
fn test_search_collection_by_name() {
    let (db, _dir) = open_db();
    let menu = db.create_collection("menu_notes").unwrap();
    add_doc(&db, menu, "seasonal specials", rotated(0.0));

    let results = db
        .search_collection("menu_notes", "anything", SearchOptions::default())
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "seasonal specials");

    db.close().unwrap();
}

#[test]
fn test_search_collections_are_isolated() {
    let (db, _dir) = open_db();
    let reviews = db.create_collection("restaurant_reviews").unwrap();
    let menu = db.create_collection("menu_notes").unwrap();
    add_doc(&db, reviews, "a review", rotated(0.0));
    add_doc(&db, menu, "a menu note", rotated(0.0));

    let results = db.search("anything", SearchOptions::default()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "a review");

    db.close().unwrap();
}

// ============================================================================
// Metadata and Persistence
// ============================================================================

#[test]
fn test_search_results_carry_metadata() {
    let (db, _dir) = open_db();
    let collection_id = db.create_collection("restaurant_reviews").unwrap();

    let mut metadata = HashMap::new();
    metadata.insert("review_idx".to_string(), MetadataValue::Integer(42));
    db.add_document(NewDocument {
        collection_id,
        text: "superb noodles".to_string(),
        metadata,
        embedding: Some(rotated(0.0)),
    })
    .unwrap();

    let results = db.search("anything", SearchOptions::default()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].metadata.get("review_idx"),
        Some(&MetadataValue::Integer(42))
    );

    db.close().unwrap();
}

#[test]
fn test_search_works_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    let db = Relish::open_with_embedding(
        &path,
        Config::default(),
        Box::new(FixedQueryEmbedding { vector: axis(0) }),
    )
    .unwrap();
    seed_graded_corpus(&db);
    db.close().unwrap();

    let db = Relish::open_with_embedding(
        &path,
        Config::default(),
        Box::new(FixedQueryEmbedding { vector: axis(0) }),
    )
    .unwrap();
    let results = db.search("anything", SearchOptions::default()).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].text, "identical");

    db.close().unwrap();
}

#[test]
fn test_search_excludes_deleted_documents() {
    let (db, _dir) = open_db();
    let collection_id = db.create_collection("restaurant_reviews").unwrap();
    add_doc(&db, collection_id, "keeper", rotated(0.0));
    let doomed = db
        .add_document(NewDocument {
            collection_id,
            text: "doomed".to_string(),
            embedding: Some(rotated(0.2)),
            ..Default::default()
        })
        .unwrap();

    db.delete_document(doomed).unwrap();

    let results = db.search("anything", SearchOptions::default()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "keeper");

    db.close().unwrap();
}

// ============================================================================
// Similarity Algebra
// ============================================================================

mod similarity_properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Cosine distances live in [0, 2]; similarity must stay in
        /// [1/3, 1].
        #[test]
        fn similarity_stays_in_range(distance in 0.0f32..=2.0f32) {
            let similarity = similarity_from_distance(distance);
            prop_assert!(similarity >= 1.0 / 3.0 - 1e-6);
            prop_assert!(similarity <= 1.0);
        }

        /// Closer vectors never score lower.
        #[test]
        fn similarity_is_monotonic(d1 in 0.0f32..=2.0f32, d2 in 0.0f32..=2.0f32) {
            let (near, far) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
            prop_assert!(
                similarity_from_distance(near) >= similarity_from_distance(far)
            );
        }

        /// The conversion is continuous: nearby distances give nearby
        /// scores (Lipschitz bound 1 on [0, 2]).
        #[test]
        fn similarity_is_continuous(d in 0.0f32..=2.0f32, eps in 0.0f32..=0.01f32) {
            let a = similarity_from_distance(d);
            let b = similarity_from_distance((d + eps).min(2.0));
            prop_assert!((a - b).abs() <= eps + 1e-6);
        }
    }
}
