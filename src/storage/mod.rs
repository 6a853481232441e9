//! Storage layer abstractions for relish.
//!
//! This module provides a trait-based abstraction over the storage engine,
//! allowing different backends to be used (e.g., redb, mock for testing).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Relish                                  │
//! │                         │                                    │
//! │                         ▼                                    │
//! │              ┌─────────────────────┐                        │
//! │              │   StorageEngine     │  ← Trait               │
//! │              └─────────────────────┘                        │
//! │                    ▲         ▲                              │
//! │                    │         │                              │
//! │         ┌─────────┴─┐   ┌───┴─────────┐                    │
//! │         │RedbStorage│   │ MockStorage │                    │
//! │         └───────────┘   └─────────────┘                    │
//! │           (prod)           (test)                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod redb;
pub mod schema;

pub use self::redb::RedbStorage;
pub use schema::{DatabaseMetadata, SCHEMA_VERSION};

use std::path::Path;

use crate::collection::Collection;
use crate::config::Config;
use crate::document::Document;
use crate::error::Result;
use crate::types::{CollectionId, DocumentId};

/// Storage engine trait for relish.
///
/// This trait defines the contract that any storage backend must implement.
/// The primary implementation is [`RedbStorage`], but other implementations
/// can be created for testing or alternative backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow the engine to be shared
/// across threads. The engine handles internal synchronization.
///
/// # Example
///
/// ```rust,ignore
/// use relish::storage::{StorageEngine, RedbStorage};
///
/// let storage = RedbStorage::open("./relish.db", &config)?;
/// let metadata = storage.metadata();
/// println!("Schema version: {}", metadata.schema_version);
/// ```
pub trait StorageEngine: Send + Sync {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Returns the database metadata.
    ///
    /// The metadata includes schema version, embedding dimension, and timestamps.
    fn metadata(&self) -> &DatabaseMetadata;

    /// Closes the storage engine, flushing any pending writes.
    ///
    /// This method consumes the storage engine. After calling `close()`,
    /// the engine cannot be used.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend supports reporting flush failures.
    /// Note: the current redb backend flushes on drop (infallible), so
    /// this always returns `Ok(())` for [`RedbStorage`].
    fn close(self: Box<Self>) -> Result<()>;

    /// Returns the path to the database file, if applicable.
    ///
    /// Some storage implementations (like in-memory) may not have a path.
    fn path(&self) -> Option<&Path>;

    // =========================================================================
    // Collection Storage Operations
    // =========================================================================

    /// Saves a collection to storage.
    ///
    /// If a collection with the same ID already exists, it is overwritten.
    /// Each call opens and commits its own write transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction or serialization fails.
    fn save_collection(&self, collection: &Collection) -> Result<()>;

    /// Retrieves a collection by ID.
    ///
    /// Returns `None` if no collection with the given ID exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction or deserialization fails.
    fn get_collection(&self, id: CollectionId) -> Result<Option<Collection>>;

    /// Retrieves a collection by name.
    ///
    /// Names are unique (enforced at creation), so this scans the
    /// collections table for the first match. Returns `None` if no
    /// collection with the given name exists.
    fn find_collection_by_name(&self, name: &str) -> Result<Option<Collection>>;

    /// Lists all collections in the database.
    ///
    /// Returns an empty vector if no collections exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction or deserialization fails.
    fn list_collections(&self) -> Result<Vec<Collection>>;

    /// Deletes a collection by ID.
    ///
    /// Returns `true` if the collection existed and was deleted,
    /// `false` if no collection with the given ID was found.
    ///
    /// Does NOT cascade to documents; call
    /// [`delete_documents_in_collection`](Self::delete_documents_in_collection)
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if the write transaction fails.
    fn delete_collection(&self, id: CollectionId) -> Result<bool>;

    // =========================================================================
    // Document Storage Operations
    // =========================================================================

    /// Saves a document and its embedding to storage.
    ///
    /// Writes atomically to 3 tables in a single transaction:
    /// - `DOCUMENTS_TABLE` — the document record (without embedding)
    /// - `EMBEDDINGS_TABLE` — the embedding vector as raw f32 bytes
    /// - `DOCUMENTS_BY_COLLECTION_TABLE` — membership index
    ///
    /// The embedding is taken from `document.embedding`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction or serialization fails.
    fn save_document(&self, document: &Document) -> Result<()>;

    /// Saves a batch of documents in a single transaction.
    ///
    /// Either every document in the batch is stored or none are. Used by
    /// CSV ingestion to keep batches atomic.
    fn save_documents(&self, documents: &[Document]) -> Result<()>;

    /// Retrieves a document by ID, including its embedding.
    ///
    /// Reads from both `DOCUMENTS_TABLE` and `EMBEDDINGS_TABLE` to
    /// reconstitute the full document with embedding.
    ///
    /// Returns `None` if no document with the given ID exists.
    fn get_document(&self, id: DocumentId) -> Result<Option<Document>>;

    /// Permanently deletes a document and its embedding.
    ///
    /// Removes from all 3 tables in a single transaction.
    ///
    /// Returns `true` if the document existed and was deleted,
    /// `false` if not found.
    fn delete_document(&self, id: DocumentId) -> Result<bool>;

    /// Deletes all documents and related entries for a collection.
    ///
    /// Used for cascade deletion when a collection is removed. Cleans up:
    /// - Document records
    /// - Embedding vectors
    /// - Membership index entries
    ///
    /// Returns the number of documents deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the write transaction fails.
    fn delete_documents_in_collection(&self, id: CollectionId) -> Result<usize>;

    /// Counts documents belonging to a collection.
    ///
    /// Queries the `documents_by_collection` multimap index.
    /// Returns 0 if no documents exist for the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction fails.
    fn document_count(&self, id: CollectionId) -> Result<usize>;

    /// Retrieves an embedding vector by document ID.
    ///
    /// Returns `None` if no embedding exists for the given ID.
    fn get_embedding(&self, id: DocumentId) -> Result<Option<Vec<f32>>>;

    /// Retrieves every (document, embedding) pair in a collection.
    ///
    /// This feeds index rebuilds on open; the order is unspecified.
    fn embeddings_in_collection(&self, id: CollectionId) -> Result<Vec<(DocumentId, Vec<f32>)>>;
}

/// Opens a storage engine at the given path.
///
/// This is a convenience function that creates a [`RedbStorage`] instance.
/// For more control, use `RedbStorage::open()` directly.
///
/// # Arguments
///
/// * `path` - Path to the database file (created if it doesn't exist)
/// * `config` - Engine configuration
///
/// # Errors
///
/// Returns an error if:
/// - The database file is corrupted
/// - The database is locked by another process
/// - Schema version doesn't match
/// - Embedding dimension doesn't match (for existing databases)
pub fn open_storage(path: impl AsRef<Path>, config: &Config) -> Result<Box<dyn StorageEngine>> {
    let storage = RedbStorage::open(path, config)?;
    Ok(Box::new(storage))
}
