//! Relish main struct and lifecycle operations.
//!
//! The [`Relish`] struct is the primary interface for interacting with
//! the engine. It provides methods for:
//!
//! - Opening and closing the database
//! - Managing collections (isolation units)
//! - Adding and fetching documents
//! - Scored semantic search and CSV ingestion
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use relish::{Relish, Config, NewDocument};
//!
//! // Open or create a database
//! let db = Relish::open("./relish.db", Config::default())?;
//!
//! // Create a collection for your corpus
//! let collection_id = db.create_collection("restaurant_reviews")?;
//!
//! // Add a document
//! db.add_document(NewDocument {
//!     collection_id,
//!     text: "Great dumplings, cozy atmosphere".to_string(),
//!     ..Default::default()
//! })?;
//!
//! // Search it
//! let results = db.search("where to eat dumplings", Default::default())?;
//!
//! // Close when done
//! db.close()?;
//! ```
//!
//! # Thread Safety
//!
//! `Relish` is `Send + Sync` and can be shared across threads using `Arc`.
//! The underlying storage uses MVCC for concurrent reads with exclusive
//! write locking; vector indexes serialize writes internally.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relish::{Relish, Config};
//!
//! let db = Arc::new(Relish::open("./relish.db", Config::default())?);
//!
//! // Clone Arc for use in another thread
//! let db_clone = Arc::clone(&db);
//! std::thread::spawn(move || {
//!     // Safe to use db_clone here
//! });
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::embedding::{create_embedding_service, EmbeddingService};
use crate::error::{RelishError, Result};
use crate::storage::{open_storage, DatabaseMetadata, StorageEngine};
use crate::types::CollectionId;
use crate::vector::HnswIndex;

/// The main relish database handle.
///
/// This is the primary interface for all operations. Create an instance
/// with [`Relish::open()`] and close it with [`Relish::close()`].
///
/// # Ownership
///
/// `Relish` owns its storage, embedding service, and vector indexes.
/// When you call `close()`, the handle is consumed and cannot be used
/// afterward. This ensures resources are properly released and index
/// metadata is persisted.
pub struct Relish {
    /// Storage engine (redb).
    storage: Box<dyn StorageEngine>,

    /// Embedding service (external or ONNX).
    embedding: Box<dyn EmbeddingService>,

    /// One HNSW index per collection, keyed by collection ID.
    ///
    /// Rebuilt from stored embeddings on open; entries are added and
    /// removed as collections are created and deleted.
    indexes: RwLock<HashMap<CollectionId, Arc<HnswIndex>>>,

    /// Directory holding per-collection index files (`<db path>.hnsw/`).
    index_dir: PathBuf,

    /// Configuration used to open this database.
    config: Config,
}

impl std::fmt::Debug for Relish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relish")
            .field("config", &self.config)
            .field("embedding_dimension", &self.embedding_dimension())
            .finish_non_exhaustive()
    }
}

/// Index files live next to the database file: `./relish.db` gets
/// `./relish.db.hnsw/`.
fn index_dir_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".hnsw");
    PathBuf::from(os)
}

impl Relish {
    /// Opens or creates a relish database at the specified path.
    ///
    /// If the database doesn't exist, it will be created with the given
    /// configuration. If it exists, the configuration will be validated
    /// against the stored settings (e.g., embedding dimension must match).
    /// Vector indexes for all collections are rebuilt from stored
    /// embeddings before this returns.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the database file (created if it doesn't exist)
    /// * `config` - Configuration options for the database
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration is invalid (see [`Config::validate`])
    /// - Database file is corrupted
    /// - Database is locked by another process
    /// - Schema version doesn't match (needs migration)
    /// - Embedding dimension doesn't match existing database
    /// - The embedding provider fails to initialize (e.g., missing model)
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use relish::{Relish, Config, EmbeddingDimension};
    ///
    /// // Open with default configuration
    /// let db = Relish::open("./relish.db", Config::default())?;
    ///
    /// // Open with custom embedding dimension
    /// let db = Relish::open("./relish.db", Config {
    ///     embedding_dimension: EmbeddingDimension::D768,
    ///     ..Default::default()
    /// })?;
    /// ```
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate().map_err(RelishError::from)?;
        let embedding = create_embedding_service(&config)?;
        Self::open_inner(path.as_ref(), config, embedding)
    }

    /// Opens a database with a caller-provided embedding service.
    ///
    /// Use this to plug in a custom [`EmbeddingService`] implementation
    /// (a remote API client, a different local model) instead of the
    /// providers built from [`Config::embedding_provider`]. The service's
    /// dimension must match `config.embedding_dimension`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Relish::open`], plus a validation error
    /// if the service dimension doesn't match the configuration.
    #[instrument(skip(config, embedding), fields(path = %path.as_ref().display()))]
    pub fn open_with_embedding(
        path: impl AsRef<Path>,
        config: Config,
        embedding: Box<dyn EmbeddingService>,
    ) -> Result<Self> {
        config.validate().map_err(RelishError::from)?;

        if embedding.dimension() != config.embedding_dimension.size() {
            return Err(RelishError::Validation(
                crate::error::ValidationError::dimension_mismatch(
                    config.embedding_dimension.size(),
                    embedding.dimension(),
                ),
            ));
        }

        Self::open_inner(path.as_ref(), config, embedding)
    }

    fn open_inner(
        path: &Path,
        config: Config,
        embedding: Box<dyn EmbeddingService>,
    ) -> Result<Self> {
        info!("Opening relish");

        // Open storage engine
        let storage = open_storage(path, &config)?;

        // Rebuild one vector index per collection. Stored embeddings are
        // the source of truth; the sidecar metadata only contributes the
        // soft-deleted set.
        let index_dir = index_dir_for(path);
        let dimension = config.embedding_dimension.size();
        let mut indexes = HashMap::new();

        for collection in storage.list_collections()? {
            let embeddings = storage.embeddings_in_collection(collection.id)?;
            let vectors = embeddings.len();

            let index = HnswIndex::rebuild_from_embeddings(
                collection.id,
                dimension,
                &config.hnsw,
                embeddings,
            )?;

            match HnswIndex::load_metadata(&index_dir, collection.id)? {
                Some(meta) if meta.dimension != dimension => {
                    warn!(
                        collection_id = %collection.id,
                        expected = dimension,
                        found = meta.dimension,
                        "Ignoring index metadata with mismatched dimension"
                    );
                }
                Some(meta) => index.restore_deleted_set(&meta.deleted)?,
                None => {}
            }

            debug!(collection_id = %collection.id, vectors, "Rebuilt vector index");
            indexes.insert(collection.id, Arc::new(index));
        }

        info!(
            dimension,
            collections = indexes.len(),
            sync_mode = ?config.sync_mode,
            "relish opened successfully"
        );

        Ok(Self {
            storage,
            embedding,
            indexes: RwLock::new(indexes),
            index_dir,
            config,
        })
    }

    /// Closes the database, flushing all pending writes.
    ///
    /// This method consumes the `Relish` instance, ensuring it cannot
    /// be used after closing. Index metadata sidecars are written so
    /// soft-deleted sets survive restarts, then the storage engine
    /// flushes all buffered data to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend reports a flush failure.
    /// Index sidecar write failures are logged but not fatal; the index
    /// is rebuilt from storage on the next open.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use relish::{Relish, Config};
    ///
    /// let db = Relish::open("./relish.db", Config::default())?;
    /// // ... use the database ...
    /// db.close()?;  // db is consumed here
    /// // db.something() // Compile error: db was moved
    /// ```
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        info!("Closing relish");

        // A poisoned lock still holds the map; closing should not fail
        // over it.
        let indexes = self
            .indexes
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for (collection_id, index) in indexes {
            if let Err(err) = index.save_to_dir(&self.index_dir) {
                warn!(collection_id = %collection_id, error = %err, "Failed to persist index metadata");
            }
        }

        // Close storage (flushes pending writes)
        self.storage.close()?;

        info!("relish closed successfully");
        Ok(())
    }

    /// Returns a reference to the database configuration.
    ///
    /// This is the configuration that was used to open the database.
    /// Note that some settings (like embedding dimension) are locked
    /// on database creation and cannot be changed.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the database metadata.
    ///
    /// Metadata includes schema version, embedding dimension, and timestamps
    /// for when the database was created and last opened.
    #[inline]
    pub fn metadata(&self) -> &DatabaseMetadata {
        self.storage.metadata()
    }

    /// Returns the embedding dimension configured for this database.
    ///
    /// All embeddings stored in this database must have exactly this
    /// many dimensions.
    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        self.config.embedding_dimension.size()
    }

    /// Runs `f` against a collection's in-memory vector index.
    ///
    /// Returns `Ok(None)` when no index is registered for `id`. Meant
    /// for inspection (index sizes, membership checks) in tests and
    /// tooling; regular operations go through the document and search
    /// APIs.
    pub fn with_index<T>(
        &self,
        id: CollectionId,
        f: impl FnOnce(&HnswIndex) -> T,
    ) -> Result<Option<T>> {
        let indexes = self
            .indexes
            .read()
            .map_err(|_| RelishError::vector("index registry lock poisoned"))?;
        Ok(indexes.get(&id).map(|index| f(index.as_ref())))
    }

    // =========================================================================
    // Internal Accessors (for use by feature modules)
    // =========================================================================

    /// Returns a reference to the storage engine.
    #[inline]
    pub(crate) fn storage(&self) -> &dyn StorageEngine {
        self.storage.as_ref()
    }

    /// Returns a reference to the embedding service.
    #[inline]
    pub(crate) fn embedding(&self) -> &dyn EmbeddingService {
        self.embedding.as_ref()
    }

    /// Returns the directory holding per-collection index files.
    #[inline]
    pub(crate) fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Returns the vector index for a collection, if one is registered.
    pub(crate) fn index_for(&self, id: CollectionId) -> Option<Arc<HnswIndex>> {
        self.indexes.read().ok()?.get(&id).cloned()
    }

    /// Registers the vector index for a newly created collection.
    pub(crate) fn register_index(&self, id: CollectionId, index: Arc<HnswIndex>) {
        if let Ok(mut map) = self.indexes.write() {
            map.insert(id, index);
        }
    }

    /// Unregisters and returns the vector index of a deleted collection.
    pub(crate) fn remove_index(&self, id: CollectionId) -> Option<Arc<HnswIndex>> {
        self.indexes.write().ok()?.remove(&id)
    }
}

// Relish is auto Send + Sync: Box<dyn StorageEngine>, Box<dyn
// EmbeddingService>, RwLock<HashMap<..>>, PathBuf, and Config are all
// Send + Sync.
