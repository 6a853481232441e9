//! ACID and crash recovery integration tests for relish.
//!
//! These tests verify that the storage layer provides the expected
//! durability and atomicity guarantees at the database level.
//!
//! # Crash Simulation
//!
//! We simulate a crash by dropping the `Relish` handle without calling
//! `close()`. Since redb durably commits data during `commit()` (not during
//! `close()`), dropping the handle simulates an ungraceful shutdown.
//!
//! redb uses shadow paging (not a WAL), so the database is always in a
//! consistent state: either the commit completed (data is present) or it
//! didn't (data is absent). There is never a half-committed state. The
//! vector indexes are rebuilt from storage on reopen, so they always
//! converge to whatever the last committed state holds.

use relish::{CollectionId, Config, DocumentId, NewDocument, Relish};
use tempfile::tempdir;

/// Helper: open a database at the given path with default config.
fn open_db(path: &std::path::Path) -> Relish {
    Relish::open(path, Config::default()).unwrap()
}

/// Helper: deterministic 384-dim embedding from a seed.
fn make_embedding(seed: u64) -> Vec<f32> {
    (0..384)
        .map(|i| (seed as f32 * 0.1 + i as f32 * 0.01).sin())
        .collect()
}

/// Helper: add a document with a seeded embedding.
fn add_review(db: &Relish, collection_id: CollectionId, seed: u64) -> DocumentId {
    db.add_document(NewDocument {
        collection_id,
        text: format!("review number {}", seed),
        embedding: Some(make_embedding(seed)),
        ..Default::default()
    })
    .unwrap()
}

// ============================================================================
// Durability Tests
// ============================================================================

#[test]
fn test_committed_data_survives_normal_close() {
    // Basic durability: save data, close gracefully, reopen, verify.
    let dir = tempdir().unwrap();
    let path = dir.path().join("durable.db");

    // Write and close normally
    let db = open_db(&path);
    let collection_id = db.create_collection("reviews").unwrap();
    let doc_id = add_review(&db, collection_id, 1);
    db.close().unwrap();

    // Reopen and verify
    let db = open_db(&path);
    let collection = db.get_collection(collection_id).unwrap();
    assert!(collection.is_some(), "Data must survive a normal close");
    assert_eq!(collection.unwrap().name, "reviews");

    let document = db.get_document(doc_id).unwrap();
    assert!(document.is_some());
    assert_eq!(document.unwrap().text, "review number 1");
    db.close().unwrap();
}

#[test]
fn test_committed_data_survives_crash() {
    // Crash durability: save data, DROP without close (simulates crash),
    // reopen, verify data is present.
    let dir = tempdir().unwrap();
    let path = dir.path().join("crash.db");

    let collection_id;
    let doc_id;
    {
        let db = open_db(&path);
        collection_id = db.create_collection("reviews").unwrap();
        doc_id = add_review(&db, collection_id, 7);
        // NO close() -- simulates crash (drop without flush)
    }

    // Reopen and verify
    let db = open_db(&path);
    assert!(
        db.get_collection(collection_id).unwrap().is_some(),
        "Committed collection must survive a crash (drop without close)"
    );
    assert!(
        db.get_document(doc_id).unwrap().is_some(),
        "Committed document must survive a crash"
    );

    // The rebuilt index must know about the document too
    let indexed = db
        .with_index(collection_id, |index| index.contains_document(doc_id))
        .unwrap();
    assert_eq!(indexed, Some(true), "Index must rebuild from storage");
    db.close().unwrap();
}

#[test]
fn test_bulk_data_survives_crash() {
    // Crash durability at scale: write 50 documents, crash, verify
    // all 50 are present after recovery.
    let dir = tempdir().unwrap();
    let path = dir.path().join("bulk_crash.db");

    let collection_id;
    let mut ids = Vec::new();
    {
        let db = open_db(&path);
        collection_id = db.create_collection("reviews").unwrap();
        for seed in 0..50 {
            ids.push(add_review(&db, collection_id, seed));
        }
        // NO close() -- crash
    }

    // Reopen and verify all 50
    let db = open_db(&path);
    assert_eq!(
        db.document_count(collection_id).unwrap(),
        50,
        "All 50 documents must survive crash"
    );

    // Verify each ID is present and re-indexed
    for id in &ids {
        assert!(
            db.get_document(*id).unwrap().is_some(),
            "Document {} must be present after crash",
            id
        );
    }
    let active = db
        .with_index(collection_id, |index| index.active_count())
        .unwrap();
    assert_eq!(active, Some(50));
    db.close().unwrap();
}

#[test]
fn test_committed_delete_survives_crash() {
    // A delete is a committed write like any other: it must not
    // resurrect on recovery, and the rebuilt index must exclude it.
    let dir = tempdir().unwrap();
    let path = dir.path().join("delete_crash.db");

    let collection_id;
    let kept;
    let deleted;
    {
        let db = open_db(&path);
        collection_id = db.create_collection("reviews").unwrap();
        kept = add_review(&db, collection_id, 1);
        deleted = add_review(&db, collection_id, 2);
        db.delete_document(deleted).unwrap();
        // NO close() -- crash
    }

    let db = open_db(&path);
    assert!(db.get_document(kept).unwrap().is_some());
    assert!(
        db.get_document(deleted).unwrap().is_none(),
        "A committed delete must not resurrect on recovery"
    );
    assert_eq!(db.document_count(collection_id).unwrap(), 1);

    let indexed = db
        .with_index(collection_id, |index| index.contains_document(deleted))
        .unwrap();
    assert_eq!(indexed, Some(false));
    db.close().unwrap();
}

#[test]
fn test_collection_cascade_delete_survives_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cascade_crash.db");

    let kept_id;
    let dropped_id;
    let orphan_doc;
    {
        let db = open_db(&path);
        kept_id = db.create_collection("reviews").unwrap();
        dropped_id = db.create_collection("staging").unwrap();
        add_review(&db, kept_id, 1);
        orphan_doc = add_review(&db, dropped_id, 2);
        db.delete_collection(dropped_id).unwrap();
        // NO close() -- crash
    }

    let db = open_db(&path);
    assert!(db.get_collection(kept_id).unwrap().is_some());
    assert!(db.get_collection(dropped_id).unwrap().is_none());
    assert!(
        db.get_document(orphan_doc).unwrap().is_none(),
        "Cascade delete must be durable"
    );
    assert!(db
        .with_index(dropped_id, |index| index.active_count())
        .unwrap()
        .is_none());
    db.close().unwrap();
}

#[test]
fn test_multiple_crash_cycles() {
    // Multiple crash/recovery cycles should not cause corruption.
    let dir = tempdir().unwrap();
    let path = dir.path().join("multi_crash.db");

    // Cycle 0: create the collection and crash
    let collection_id;
    {
        let db = open_db(&path);
        collection_id = db.create_collection("reviews").unwrap();
    }

    // Cycles 1..=5: each reopens, verifies the running count, writes
    // one more document, and crashes again.
    for cycle in 1..=5u64 {
        let db = open_db(&path);
        assert_eq!(
            db.document_count(collection_id).unwrap() as u64,
            cycle - 1,
            "Cycle {} must see all prior writes",
            cycle
        );
        add_review(&db, collection_id, cycle);
    }

    // Final open: verify everything survived
    let db = open_db(&path);
    assert_eq!(db.document_count(collection_id).unwrap(), 5);
    db.close().unwrap();
}

#[test]
fn test_writes_after_recovery_work_normally() {
    // Recovery is not read-only: a database reopened after a crash
    // accepts new writes and closes cleanly.
    let dir = tempdir().unwrap();
    let path = dir.path().join("recover_write.db");

    let collection_id;
    {
        let db = open_db(&path);
        collection_id = db.create_collection("reviews").unwrap();
        add_review(&db, collection_id, 1);
        // NO close() -- crash
    }

    {
        let db = open_db(&path);
        add_review(&db, collection_id, 2);
        db.close().unwrap();
    }

    let db = open_db(&path);
    assert_eq!(db.document_count(collection_id).unwrap(), 2);
    db.close().unwrap();
}
