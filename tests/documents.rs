//! Integration tests for document storage operations.
//!
//! Documents are added with caller-provided embeddings (External mode),
//! fetched back with their embedding joined in, and removed from both
//! storage and the vector index on delete.

use std::collections::HashMap;

use relish::{CollectionId, Config, MetadataValue, NewDocument, Relish};
use tempfile::tempdir;

/// Default embedding dimension for tests (D384).
const DIM: usize = 384;

/// Deterministic embedding from a seed.
fn make_embedding(seed: u64) -> Vec<f32> {
    (0..DIM)
        .map(|i| (seed as f32 * 0.1 + i as f32 * 0.01).sin())
        .collect()
}

/// Helper: open DB and create a collection, return both.
fn open_db_with_collection() -> (Relish, CollectionId, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let db = Relish::open(&path, Config::default()).unwrap();
    let id = db.create_collection("reviews").unwrap();
    (db, id, dir)
}

// ============================================================================
// Add Document
// ============================================================================

#[test]
fn test_add_document() {
    let (db, collection_id, _dir) = open_db_with_collection();

    let embedding = make_embedding(1);
    let id = db
        .add_document(NewDocument {
            collection_id,
            text: "Great pasta, slow service.".to_string(),
            embedding: Some(embedding.clone()),
            ..Default::default()
        })
        .unwrap();

    let document = db.get_document(id).unwrap().unwrap();
    assert_eq!(document.id, id);
    assert_eq!(document.collection_id, collection_id);
    assert_eq!(document.text, "Great pasta, slow service.");
    assert_eq!(document.embedding, embedding);
    assert!(document.metadata.is_empty());

    db.close().unwrap();
}

#[test]
fn test_add_document_with_metadata() {
    let (db, collection_id, _dir) = open_db_with_collection();

    let mut metadata = HashMap::new();
    metadata.insert("review_idx".to_string(), MetadataValue::Integer(12));
    metadata.insert("rating".to_string(), MetadataValue::Float(4.5));
    metadata.insert("verified".to_string(), MetadataValue::Boolean(true));
    metadata.insert(
        "source".to_string(),
        MetadataValue::String("google".to_string()),
    );

    let id = db
        .add_document(NewDocument {
            collection_id,
            text: "Tremendous milkshakes.".to_string(),
            metadata: metadata.clone(),
            embedding: Some(make_embedding(2)),
        })
        .unwrap();

    let document = db.get_document(id).unwrap().unwrap();
    assert_eq!(document.metadata, metadata);

    db.close().unwrap();
}

#[test]
fn test_add_document_indexes_embedding() {
    let (db, collection_id, _dir) = open_db_with_collection();

    let id = db
        .add_document(NewDocument {
            collection_id,
            text: "indexed".to_string(),
            embedding: Some(make_embedding(3)),
            ..Default::default()
        })
        .unwrap();

    let contains = db
        .with_index(collection_id, |index| index.contains_document(id))
        .unwrap();
    assert_eq!(contains, Some(true));

    db.close().unwrap();
}

#[test]
fn test_add_document_unknown_collection_rejected() {
    let (db, _collection_id, _dir) = open_db_with_collection();

    let err = db
        .add_document(NewDocument {
            collection_id: CollectionId::new(),
            text: "orphan".to_string(),
            embedding: Some(make_embedding(4)),
            ..Default::default()
        })
        .unwrap_err();
    assert!(err.is_not_found());

    db.close().unwrap();
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_add_document_empty_text_rejected() {
    let (db, collection_id, _dir) = open_db_with_collection();

    let err = db
        .add_document(NewDocument {
            collection_id,
            text: "   ".to_string(),
            embedding: Some(make_embedding(5)),
            ..Default::default()
        })
        .unwrap_err();
    assert!(err.is_validation());

    db.close().unwrap();
}

#[test]
fn test_add_document_oversize_text_rejected() {
    let (db, collection_id, _dir) = open_db_with_collection();

    let err = db
        .add_document(NewDocument {
            collection_id,
            text: "x".repeat(100 * 1024 + 1),
            embedding: Some(make_embedding(6)),
            ..Default::default()
        })
        .unwrap_err();
    assert!(err.is_validation());

    db.close().unwrap();
}

#[test]
fn test_add_document_missing_embedding_rejected_in_external_mode() {
    let (db, collection_id, _dir) = open_db_with_collection();

    let err = db
        .add_document(NewDocument {
            collection_id,
            text: "no vector supplied".to_string(),
            embedding: None,
            ..Default::default()
        })
        .unwrap_err();
    assert!(err.is_validation());

    db.close().unwrap();
}

#[test]
fn test_add_document_wrong_dimension_rejected() {
    let (db, collection_id, _dir) = open_db_with_collection();

    let err = db
        .add_document(NewDocument {
            collection_id,
            text: "wrong width".to_string(),
            embedding: Some(vec![0.5; 100]),
            ..Default::default()
        })
        .unwrap_err();
    assert!(err.is_validation());

    db.close().unwrap();
}

#[test]
fn test_add_document_too_many_metadata_entries_rejected() {
    let (db, collection_id, _dir) = open_db_with_collection();

    let metadata: HashMap<String, MetadataValue> = (0..33)
        .map(|i| (format!("key-{}", i), MetadataValue::Integer(i)))
        .collect();

    let err = db
        .add_document(NewDocument {
            collection_id,
            text: "metadata heavy".to_string(),
            metadata,
            embedding: Some(make_embedding(7)),
        })
        .unwrap_err();
    assert!(err.is_validation());

    db.close().unwrap();
}

// ============================================================================
// Get Document
// ============================================================================

#[test]
fn test_get_document_unknown_id_returns_none() {
    let (db, _collection_id, _dir) = open_db_with_collection();

    assert!(db.get_document(relish::DocumentId::new()).unwrap().is_none());

    db.close().unwrap();
}

// ============================================================================
// Delete Document
// ============================================================================

#[test]
fn test_delete_document() {
    let (db, collection_id, _dir) = open_db_with_collection();

    let id = db
        .add_document(NewDocument {
            collection_id,
            text: "short-lived".to_string(),
            embedding: Some(make_embedding(8)),
            ..Default::default()
        })
        .unwrap();

    db.delete_document(id).unwrap();

    assert!(db.get_document(id).unwrap().is_none());
    assert_eq!(db.document_count(collection_id).unwrap(), 0);
    let contains = db
        .with_index(collection_id, |index| index.contains_document(id))
        .unwrap();
    assert_eq!(contains, Some(false), "Index entry removed on delete");

    db.close().unwrap();
}

#[test]
fn test_delete_document_unknown_id() {
    let (db, _collection_id, _dir) = open_db_with_collection();

    let err = db.delete_document(relish::DocumentId::new()).unwrap_err();
    assert!(err.is_not_found());

    db.close().unwrap();
}

#[test]
fn test_delete_document_twice_fails() {
    let (db, collection_id, _dir) = open_db_with_collection();

    let id = db
        .add_document(NewDocument {
            collection_id,
            text: "once only".to_string(),
            embedding: Some(make_embedding(9)),
            ..Default::default()
        })
        .unwrap();

    db.delete_document(id).unwrap();
    let err = db.delete_document(id).unwrap_err();
    assert!(err.is_not_found());

    db.close().unwrap();
}

// ============================================================================
// Collection Isolation
// ============================================================================

#[test]
fn test_documents_are_isolated_per_collection() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let db = Relish::open(&path, Config::default()).unwrap();

    let reviews = db.create_collection("reviews").unwrap();
    let notes = db.create_collection("notes").unwrap();

    let review_doc = db
        .add_document(NewDocument {
            collection_id: reviews,
            text: "review text".to_string(),
            embedding: Some(make_embedding(10)),
            ..Default::default()
        })
        .unwrap();
    db.add_document(NewDocument {
        collection_id: notes,
        text: "note text".to_string(),
        embedding: Some(make_embedding(11)),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(db.document_count(reviews).unwrap(), 1);
    assert_eq!(db.document_count(notes).unwrap(), 1);

    // The review only lives in the reviews index
    assert_eq!(
        db.with_index(reviews, |index| index.contains_document(review_doc))
            .unwrap(),
        Some(true)
    );
    assert_eq!(
        db.with_index(notes, |index| index.contains_document(review_doc))
            .unwrap(),
        Some(false)
    );

    db.close().unwrap();
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_documents_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    let db = Relish::open(&path, Config::default()).unwrap();
    let collection_id = db.create_collection("reviews").unwrap();
    let embedding = make_embedding(12);
    let mut metadata = HashMap::new();
    metadata.insert("review_idx".to_string(), MetadataValue::Integer(0));
    let id = db
        .add_document(NewDocument {
            collection_id,
            text: "durable review".to_string(),
            metadata: metadata.clone(),
            embedding: Some(embedding.clone()),
        })
        .unwrap();
    db.close().unwrap();

    let db = Relish::open(&path, Config::default()).unwrap();
    let document = db.get_document(id).unwrap().unwrap();
    assert_eq!(document.text, "durable review");
    assert_eq!(document.metadata, metadata);
    assert_eq!(document.embedding, embedding);

    db.close().unwrap();
}
