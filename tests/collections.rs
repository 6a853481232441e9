//! Integration tests for collection management operations.
//!
//! Tests the full stack: Relish facade, storage engine, index registry.

use relish::{Config, NewDocument, Relish};
use tempfile::tempdir;

/// Helper to open a fresh database with default config.
fn open_db() -> (Relish, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let db = Relish::open(&path, Config::default()).unwrap();
    (db, dir)
}

/// Deterministic 384-dim embedding from a seed.
fn make_embedding(seed: u64) -> Vec<f32> {
    (0..384)
        .map(|i| (seed as f32 * 0.1 + i as f32 * 0.01).sin())
        .collect()
}

// ============================================================================
// Create Collection
// ============================================================================

#[test]
fn test_create_collection() {
    let (db, _dir) = open_db();

    let id = db.create_collection("restaurant_reviews").unwrap();

    let collection = db.get_collection(id).unwrap().unwrap();
    assert_eq!(collection.name, "restaurant_reviews");
    assert_eq!(collection.embedding_dimension, 384); // default D384
    assert!(collection.description.is_none());

    db.close().unwrap();
}

#[test]
fn test_create_collection_with_description() {
    let (db, _dir) = open_db();

    let id = db
        .create_collection_with_description("reviews", "Customer reviews corpus")
        .unwrap();

    let collection = db.get_collection(id).unwrap().unwrap();
    assert_eq!(collection.name, "reviews");
    assert_eq!(collection.description.as_deref(), Some("Customer reviews corpus"));

    db.close().unwrap();
}

#[test]
fn test_create_collection_registers_index() {
    let (db, _dir) = open_db();

    let id = db.create_collection("reviews").unwrap();

    let size = db.with_index(id, |index| index.active_count()).unwrap();
    assert_eq!(size, Some(0), "A fresh collection gets an empty index");

    db.close().unwrap();
}

#[test]
fn test_create_collection_empty_name_rejected() {
    let (db, _dir) = open_db();

    let result = db.create_collection("");
    assert!(result.is_err());
    assert!(result.unwrap_err().is_validation());

    db.close().unwrap();
}

#[test]
fn test_create_collection_whitespace_name_rejected() {
    let (db, _dir) = open_db();

    let result = db.create_collection("   ");
    assert!(result.is_err());
    assert!(result.unwrap_err().is_validation());

    db.close().unwrap();
}

#[test]
fn test_create_collection_long_name_rejected() {
    let (db, _dir) = open_db();

    let long_name = "x".repeat(129);
    let result = db.create_collection(&long_name);
    assert!(result.is_err());
    assert!(result.unwrap_err().is_validation());

    db.close().unwrap();
}

#[test]
fn test_create_collection_max_length_name_accepted() {
    let (db, _dir) = open_db();

    let name = "x".repeat(128);
    let id = db.create_collection(&name).unwrap();

    let collection = db.get_collection(id).unwrap().unwrap();
    assert_eq!(collection.name.len(), 128);

    db.close().unwrap();
}

#[test]
fn test_create_collection_duplicate_name_rejected() {
    let (db, _dir) = open_db();

    db.create_collection("reviews").unwrap();
    let result = db.create_collection("reviews");
    assert!(result.is_err());
    assert!(result.unwrap_err().is_validation());

    db.close().unwrap();
}

// ============================================================================
// Get / Find Collection
// ============================================================================

#[test]
fn test_get_collection() {
    let (db, _dir) = open_db();

    let id = db.create_collection("reviews").unwrap();

    let collection = db.get_collection(id).unwrap();
    assert!(collection.is_some());
    assert_eq!(collection.unwrap().name, "reviews");

    db.close().unwrap();
}

#[test]
fn test_get_collection_unknown_id_returns_none() {
    let (db, _dir) = open_db();

    let unknown = relish::CollectionId::new();
    assert!(db.get_collection(unknown).unwrap().is_none());

    db.close().unwrap();
}

#[test]
fn test_find_collection_by_name() {
    let (db, _dir) = open_db();

    let id = db.create_collection("reviews").unwrap();

    let found = db.find_collection("reviews").unwrap().unwrap();
    assert_eq!(found.id, id);

    assert!(db.find_collection("nonexistent").unwrap().is_none());

    db.close().unwrap();
}

#[test]
fn test_list_collections() {
    let (db, _dir) = open_db();

    assert!(db.list_collections().unwrap().is_empty());

    db.create_collection("alpha").unwrap();
    db.create_collection("beta").unwrap();
    db.create_collection("gamma").unwrap();

    let mut names: Vec<String> = db
        .list_collections()
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);

    db.close().unwrap();
}

// ============================================================================
// Document Count
// ============================================================================

#[test]
fn test_document_count() {
    let (db, _dir) = open_db();

    let id = db.create_collection("reviews").unwrap();
    assert_eq!(db.document_count(id).unwrap(), 0);

    for seed in 0..3u64 {
        db.add_document(NewDocument {
            collection_id: id,
            text: format!("review {}", seed),
            embedding: Some(make_embedding(seed)),
            ..Default::default()
        })
        .unwrap();
    }
    assert_eq!(db.document_count(id).unwrap(), 3);

    db.close().unwrap();
}

#[test]
fn test_document_count_unknown_collection() {
    let (db, _dir) = open_db();

    let err = db.document_count(relish::CollectionId::new()).unwrap_err();
    assert!(err.is_not_found());

    db.close().unwrap();
}

// ============================================================================
// Delete Collection
// ============================================================================

#[test]
fn test_delete_collection() {
    let (db, _dir) = open_db();

    let id = db.create_collection("reviews").unwrap();
    db.delete_collection(id).unwrap();

    assert!(db.get_collection(id).unwrap().is_none());
    assert!(db.find_collection("reviews").unwrap().is_none());

    db.close().unwrap();
}

#[test]
fn test_delete_collection_cascades_to_documents() {
    let (db, _dir) = open_db();

    let id = db.create_collection("reviews").unwrap();
    let mut doc_ids = Vec::new();
    for seed in 0..4u64 {
        doc_ids.push(
            db.add_document(NewDocument {
                collection_id: id,
                text: format!("review {}", seed),
                embedding: Some(make_embedding(seed)),
                ..Default::default()
            })
            .unwrap(),
        );
    }

    db.delete_collection(id).unwrap();

    for doc_id in doc_ids {
        assert!(db.get_document(doc_id).unwrap().is_none());
    }
    // The index is unregistered as well
    assert!(db.with_index(id, |index| index.active_count()).unwrap().is_none());

    db.close().unwrap();
}

#[test]
fn test_delete_collection_unknown_id() {
    let (db, _dir) = open_db();

    let err = db.delete_collection(relish::CollectionId::new()).unwrap_err();
    assert!(err.is_not_found());

    db.close().unwrap();
}

#[test]
fn test_delete_collection_frees_name_for_reuse() {
    let (db, _dir) = open_db();

    let first = db.create_collection("reviews").unwrap();
    db.delete_collection(first).unwrap();

    let second = db.create_collection("reviews").unwrap();
    assert_ne!(first, second);

    db.close().unwrap();
}

#[test]
fn test_collections_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    let db = Relish::open(&path, Config::default()).unwrap();
    let id = db
        .create_collection_with_description("reviews", "persisted corpus")
        .unwrap();
    db.close().unwrap();

    let db = Relish::open(&path, Config::default()).unwrap();
    let collection = db.get_collection(id).unwrap().unwrap();
    assert_eq!(collection.name, "reviews");
    assert_eq!(collection.description.as_deref(), Some("persisted corpus"));

    db.close().unwrap();
}
