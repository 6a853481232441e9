//! redb storage engine implementation.
//!
//! This module provides the primary storage backend for relish using
//! [redb](https://docs.rs/redb), a pure Rust embedded key-value store.
//!
//! # Features
//!
//! - ACID transactions with MVCC
//! - Single-writer, multiple-reader concurrency
//! - Automatic crash recovery
//! - Zero external dependencies (pure Rust)
//!
//! # File Layout
//!
//! When you open a database at `./relish.db`, redb creates:
//! - `./relish.db` - Main database file
//! - `./relish.db.lock` - Lock file for writer coordination (may not be visible)

use std::path::{Path, PathBuf};

use ::redb::{Database, ReadableMultimapTable, ReadableTable};
use tracing::{debug, info, instrument, warn};

use crate::collection::Collection;
use crate::document::Document;
use crate::types::{CollectionId, DocumentId};

use super::schema::{
    decode_embedding, encode_embedding, DatabaseMetadata, COLLECTIONS_TABLE,
    DOCUMENTS_BY_COLLECTION_TABLE, DOCUMENTS_TABLE, EMBEDDINGS_TABLE, METADATA_TABLE,
    SCHEMA_VERSION,
};
use super::StorageEngine;
use crate::config::{Config, EmbeddingDimension};
use crate::error::{RelishError, Result, StorageError, ValidationError};

/// Metadata key in the metadata table.
const METADATA_KEY: &str = "db_metadata";

/// redb storage engine wrapper.
///
/// This struct holds the redb database handle and cached metadata.
/// It implements [`StorageEngine`] for use with relish.
///
/// # Thread Safety
///
/// `RedbStorage` is `Send + Sync`. redb handles internal synchronization
/// using MVCC for readers and exclusive locking for writers.
#[derive(Debug)]
pub struct RedbStorage {
    /// The redb database handle.
    db: Database,

    /// Cached database metadata.
    metadata: DatabaseMetadata,

    /// Path to the database file.
    path: PathBuf,
}

impl RedbStorage {
    /// Opens or creates a database at the given path.
    ///
    /// If the database doesn't exist, it will be created and initialized
    /// with the configuration settings. If it exists, the configuration
    /// will be validated against the stored metadata.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the database file
    /// * `config` - Engine configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database file is corrupted
    /// - The database is locked by another process
    /// - Schema version doesn't match
    /// - Embedding dimension doesn't match (for existing databases)
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use relish::{Config, storage::RedbStorage};
    ///
    /// let storage = RedbStorage::open("./relish.db", &Config::default())?;
    /// ```
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let db_exists = path.exists();

        debug!(db_exists = db_exists, "Opening storage engine");

        // Create or open the database
        let db = Self::create_database(path, config)?;

        if db_exists {
            // Validate existing database
            Self::open_existing(db, path.to_path_buf(), config)
        } else {
            // Initialize new database
            Self::initialize_new(db, path.to_path_buf(), config)
        }
    }

    /// Creates the redb database with appropriate settings.
    fn create_database(path: &Path, _config: &Config) -> Result<Database> {
        let builder = Database::builder();

        // Note: redb doesn't expose a typed error variant for lock conflicts,
        // so we detect them via error message string matching. This may need
        // updating if redb changes its error messages in a future version.
        let db = builder.create(path).map_err(|e| {
            if e.to_string().contains("locked") {
                StorageError::DatabaseLocked
            } else {
                StorageError::Redb(e.to_string())
            }
        })?;

        debug!("Database file opened successfully");
        Ok(db)
    }

    /// Initializes a new database with tables and metadata.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn initialize_new(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Initializing new database");

        let metadata = DatabaseMetadata::new(config.embedding_dimension);

        // Create all tables and write metadata in a single transaction
        let write_txn = db.begin_write().map_err(StorageError::from)?;

        {
            // Create the metadata table and write metadata
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes = bincode::serialize(&metadata)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;

            // Create other tables (they're created on first access)
            let _ = write_txn.open_table(COLLECTIONS_TABLE)?;
            let _ = write_txn.open_table(DOCUMENTS_TABLE)?;
            let _ = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let _ = write_txn.open_multimap_table(DOCUMENTS_BY_COLLECTION_TABLE)?;
        }

        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = SCHEMA_VERSION,
            dimension = config.embedding_dimension.size(),
            "Database initialized"
        );

        Ok(Self { db, metadata, path })
    }

    /// Opens and validates an existing database.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn open_existing(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Opening existing database");

        // Read metadata from the database
        let read_txn = db.begin_read().map_err(StorageError::from)?;

        let metadata = {
            let meta_table = read_txn.open_table(METADATA_TABLE).map_err(|e| {
                StorageError::corrupted(format!("Cannot open metadata table: {}", e))
            })?;

            let metadata_bytes = meta_table
                .get(METADATA_KEY)
                .map_err(StorageError::from)?
                .ok_or_else(|| StorageError::corrupted("Missing database metadata"))?;

            bincode::deserialize::<DatabaseMetadata>(metadata_bytes.value())
                .map_err(|e| StorageError::corrupted(format!("Invalid metadata format: {}", e)))?
        };

        drop(read_txn);

        // Validate schema version
        if metadata.schema_version != SCHEMA_VERSION {
            warn!(
                expected = SCHEMA_VERSION,
                found = metadata.schema_version,
                "Schema version mismatch"
            );
            return Err(RelishError::Storage(StorageError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: metadata.schema_version,
            }));
        }

        // Validate embedding dimension
        if metadata.embedding_dimension != config.embedding_dimension {
            warn!(
                expected = config.embedding_dimension.size(),
                found = metadata.embedding_dimension.size(),
                "Embedding dimension mismatch"
            );
            return Err(RelishError::Validation(
                ValidationError::DimensionMismatch {
                    expected: config.embedding_dimension.size(),
                    got: metadata.embedding_dimension.size(),
                },
            ));
        }

        // Update last_opened_at timestamp
        let mut metadata = metadata;
        metadata.touch();

        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes = bincode::serialize(&metadata)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = metadata.schema_version,
            dimension = metadata.embedding_dimension.size(),
            "Database opened successfully"
        );

        Ok(Self { db, metadata, path })
    }

    /// Returns a reference to the underlying redb database.
    ///
    /// This is for internal use by other relish modules and tests.
    #[inline]
    #[allow(dead_code)]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    /// Returns the embedding dimension configured for this database.
    #[inline]
    pub fn embedding_dimension(&self) -> EmbeddingDimension {
        self.metadata.embedding_dimension
    }

    /// Writes one document (record, embedding, membership entry) into an
    /// already-open write transaction.
    fn insert_document_in_txn(
        documents: &mut ::redb::Table<'_, &[u8; 16], &[u8]>,
        embeddings: &mut ::redb::Table<'_, &[u8; 16], &[u8]>,
        membership: &mut ::redb::MultimapTable<'_, &[u8; 16], &[u8; 16]>,
        document: &Document,
    ) -> Result<()> {
        let record_bytes = bincode::serialize(document)
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        let embedding_bytes = encode_embedding(&document.embedding);

        documents.insert(document.id.as_bytes(), record_bytes.as_slice())?;
        embeddings.insert(document.id.as_bytes(), embedding_bytes.as_slice())?;
        membership.insert(document.collection_id.as_bytes(), document.id.as_bytes())?;
        Ok(())
    }
}

impl StorageEngine for RedbStorage {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    #[instrument(skip(self))]
    fn close(self: Box<Self>) -> Result<()> {
        info!("Closing storage engine");

        // redb flushes all data durably on drop. Since `Database::drop` is
        // infallible, this method currently always returns Ok(()). The Result
        // return type is retained for API forward-compatibility if a future
        // storage backend can report flush errors.
        drop(self.db);

        info!("Storage engine closed");
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    // =========================================================================
    // Collection Storage Operations
    // =========================================================================

    fn save_collection(&self, collection: &Collection) -> Result<()> {
        let bytes = bincode::serialize(collection)
            .map_err(|e| StorageError::serialization(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut table = write_txn.open_table(COLLECTIONS_TABLE)?;
            table.insert(collection.id.as_bytes(), bytes.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        debug!(id = %collection.id, name = %collection.name, "Collection saved");
        Ok(())
    }

    fn get_collection(&self, id: CollectionId) -> Result<Option<Collection>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(COLLECTIONS_TABLE)?;

        match table.get(id.as_bytes())? {
            Some(value) => {
                let collection: Collection = bincode::deserialize(value.value())
                    .map_err(|e| StorageError::serialization(e.to_string()))?;
                Ok(Some(collection))
            }
            None => Ok(None),
        }
    }

    fn find_collection_by_name(&self, name: &str) -> Result<Option<Collection>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(COLLECTIONS_TABLE)?;

        for result in table.iter()? {
            let (_, value) = result.map_err(StorageError::from)?;
            let collection: Collection = bincode::deserialize(value.value())
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            if collection.name == name {
                return Ok(Some(collection));
            }
        }

        Ok(None)
    }

    fn list_collections(&self) -> Result<Vec<Collection>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(COLLECTIONS_TABLE)?;

        let mut collections = Vec::new();
        for result in table.iter()? {
            let (_, value) = result.map_err(StorageError::from)?;
            let collection: Collection = bincode::deserialize(value.value())
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            collections.push(collection);
        }

        Ok(collections)
    }

    fn delete_collection(&self, id: CollectionId) -> Result<bool> {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        let existed;
        {
            let mut table = write_txn.open_table(COLLECTIONS_TABLE)?;
            existed = table.remove(id.as_bytes())?.is_some();
        }
        write_txn.commit().map_err(StorageError::from)?;

        if existed {
            debug!(id = %id, "Collection deleted");
        }
        Ok(existed)
    }

    // =========================================================================
    // Document Storage Operations
    // =========================================================================

    fn save_document(&self, document: &Document) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut documents = write_txn.open_table(DOCUMENTS_TABLE)?;
            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let mut membership = write_txn.open_multimap_table(DOCUMENTS_BY_COLLECTION_TABLE)?;

            Self::insert_document_in_txn(
                &mut documents,
                &mut embeddings,
                &mut membership,
                document,
            )?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        debug!(id = %document.id, collection_id = %document.collection_id, "Document saved");
        Ok(())
    }

    fn save_documents(&self, batch: &[Document]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut documents = write_txn.open_table(DOCUMENTS_TABLE)?;
            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let mut membership = write_txn.open_multimap_table(DOCUMENTS_BY_COLLECTION_TABLE)?;

            for document in batch {
                Self::insert_document_in_txn(
                    &mut documents,
                    &mut embeddings,
                    &mut membership,
                    document,
                )?;
            }
        }
        write_txn.commit().map_err(StorageError::from)?;

        debug!(count = batch.len(), "Document batch saved");
        Ok(())
    }

    fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let documents = read_txn.open_table(DOCUMENTS_TABLE)?;

        let mut document = match documents.get(id.as_bytes())? {
            Some(value) => bincode::deserialize::<Document>(value.value())
                .map_err(|e| StorageError::serialization(e.to_string()))?,
            None => return Ok(None),
        };

        // Record and embedding are written atomically, so a missing
        // embedding row means the database was tampered with.
        let embeddings = read_txn.open_table(EMBEDDINGS_TABLE)?;
        let bytes = embeddings.get(id.as_bytes())?.ok_or_else(|| {
            StorageError::corrupted(format!("document {} has no embedding row", id))
        })?;
        document.embedding = decode_embedding(bytes.value())?;

        Ok(Some(document))
    }

    fn delete_document(&self, id: DocumentId) -> Result<bool> {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        let existed;
        {
            let mut documents = write_txn.open_table(DOCUMENTS_TABLE)?;
            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let mut membership = write_txn.open_multimap_table(DOCUMENTS_BY_COLLECTION_TABLE)?;

            // The membership entry is keyed by collection, so the record
            // must be read before it can be removed.
            let collection_id = match documents.get(id.as_bytes())? {
                Some(value) => {
                    let document: Document = bincode::deserialize(value.value())
                        .map_err(|e| StorageError::serialization(e.to_string()))?;
                    Some(document.collection_id)
                }
                None => None,
            };

            existed = collection_id.is_some();
            if let Some(collection_id) = collection_id {
                documents.remove(id.as_bytes())?;
                embeddings.remove(id.as_bytes())?;
                membership.remove(collection_id.as_bytes(), id.as_bytes())?;
            }
        }
        write_txn.commit().map_err(StorageError::from)?;

        if existed {
            debug!(id = %id, "Document deleted");
        }
        Ok(existed)
    }

    fn delete_documents_in_collection(&self, id: CollectionId) -> Result<usize> {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        let removed;
        {
            let mut documents = write_txn.open_table(DOCUMENTS_TABLE)?;
            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let mut membership = write_txn.open_multimap_table(DOCUMENTS_BY_COLLECTION_TABLE)?;

            // Collect IDs first; the multimap cannot be mutated while its
            // value iterator is live.
            let mut doc_ids: Vec<[u8; 16]> = Vec::new();
            {
                let values = membership.get(id.as_bytes())?;
                for value in values {
                    let value = value.map_err(StorageError::from)?;
                    doc_ids.push(*value.value());
                }
            }

            for doc_id in &doc_ids {
                documents.remove(doc_id)?;
                embeddings.remove(doc_id)?;
            }
            membership.remove_all(id.as_bytes())?;
            removed = doc_ids.len();
        }
        write_txn.commit().map_err(StorageError::from)?;

        debug!(collection_id = %id, removed, "Collection documents deleted");
        Ok(removed)
    }

    fn document_count(&self, id: CollectionId) -> Result<usize> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let membership = read_txn.open_multimap_table(DOCUMENTS_BY_COLLECTION_TABLE)?;

        let mut count = 0usize;
        for value in membership.get(id.as_bytes())? {
            value.map_err(StorageError::from)?;
            count += 1;
        }
        Ok(count)
    }

    fn get_embedding(&self, id: DocumentId) -> Result<Option<Vec<f32>>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let embeddings = read_txn.open_table(EMBEDDINGS_TABLE)?;

        match embeddings.get(id.as_bytes())? {
            Some(value) => Ok(Some(decode_embedding(value.value())?)),
            None => Ok(None),
        }
    }

    fn embeddings_in_collection(&self, id: CollectionId) -> Result<Vec<(DocumentId, Vec<f32>)>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let membership = read_txn.open_multimap_table(DOCUMENTS_BY_COLLECTION_TABLE)?;
        let embeddings = read_txn.open_table(EMBEDDINGS_TABLE)?;

        let mut pairs = Vec::new();
        for value in membership.get(id.as_bytes())? {
            let value = value.map_err(StorageError::from)?;
            let doc_id_bytes = *value.value();

            let bytes = embeddings.get(&doc_id_bytes)?.ok_or_else(|| {
                StorageError::corrupted(format!(
                    "document {} has no embedding row",
                    DocumentId::from_bytes(doc_id_bytes)
                ))
            })?;
            pairs.push((
                DocumentId::from_bytes(doc_id_bytes),
                decode_embedding(bytes.value())?,
            ));
        }

        Ok(pairs)
    }
}

// RedbStorage is auto Send + Sync: Database, DatabaseMetadata, and PathBuf
// are all Send + Sync.
