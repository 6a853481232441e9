//! HNSW vector index implementation using hnsw_rs.
//!
//! Wraps `hnsw_rs::Hnsw<f32, DistCosine>` with:
//! - Bidirectional `DocumentId` ↔ `usize` ID mapping
//! - Soft-delete via `HashSet` + filtered search
//! - JSON metadata persistence (`.hnsw.meta`)
//!
//! # Thread Safety
//!
//! The `hnsw_rs::Hnsw` graph uses `parking_lot::RwLock` internally,
//! so `insert()` takes `&self`. Our metadata (`IndexState`) is
//! protected by `std::sync::RwLock`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use hnsw_rs::prelude::*;

use crate::config::HnswConfig;
use crate::error::{RelishError, Result};
use crate::types::{CollectionId, DocumentId};

use super::VectorIndex;

/// HNSW vector index backed by `hnsw_rs`.
///
/// Each collection gets its own `HnswIndex` instance, providing
/// complete data isolation between collections. On-disk files are
/// named after the collection UUID.
///
/// # Persistence Strategy
///
/// Metadata (ID mappings, deleted set) is persisted to a JSON `.hnsw.meta`
/// file. The graph itself is rebuilt from redb embeddings on open, because
/// `hnsw_rs::HnswIo::load_hnsw` has lifetime constraints that create
/// self-referential struct issues. The graph dump files (via `file_dump`)
/// are saved for future optimization but not currently loaded.
pub struct HnswIndex {
    /// The underlying HNSW graph. Uses `'static` lifetime because
    /// all data is heap-owned (not memory-mapped).
    hnsw: Hnsw<'static, f32, DistCosine>,

    /// Mutable metadata protected by RwLock.
    state: RwLock<IndexState>,

    /// Owning collection; on-disk file names derive from this.
    collection_id: CollectionId,

    /// Embedding dimension (must match all inserted vectors).
    dimension: usize,
}

/// Internal mutable state for ID mapping and soft-deletion.
#[derive(Debug)]
struct IndexState {
    /// Forward map: DocumentId → internal usize ID.
    id_to_internal: HashMap<DocumentId, usize>,

    /// Reverse map: internal usize ID → DocumentId.
    /// Uses Vec for O(1) lookup by index.
    internal_to_id: Vec<DocumentId>,

    /// Set of soft-deleted internal IDs (excluded from search).
    deleted: HashSet<usize>,

    /// Next internal ID to assign (monotonically increasing).
    next_id: usize,
}

/// Serializable metadata for persistence.
#[derive(serde::Serialize, serde::Deserialize)]
pub(crate) struct IndexMetadata {
    pub(crate) dimension: usize,
    pub(crate) next_id: usize,
    /// Vec of (DocumentId UUID string, internal usize ID) pairs.
    pub(crate) id_map: Vec<(String, usize)>,
    /// Deleted DocumentId UUID strings (not internal IDs).
    ///
    /// We store UUIDs instead of internal usize IDs because internal IDs
    /// are reassigned sequentially on rebuild. Using UUIDs ensures the
    /// correct documents are marked as deleted after rebuild.
    pub(crate) deleted: Vec<String>,
}

impl HnswIndex {
    /// Creates a new empty HNSW index for a collection.
    ///
    /// # Arguments
    ///
    /// * `collection_id` - Owning collection (names persisted files)
    /// * `dimension` - Expected embedding dimension (validated on insert)
    /// * `config` - HNSW tuning parameters
    pub fn new(collection_id: CollectionId, dimension: usize, config: &HnswConfig) -> Self {
        let hnsw = Hnsw::new(
            config.max_nb_connection,
            config.max_elements,
            config.max_layer,
            config.ef_construction,
            DistCosine,
        );

        Self {
            hnsw,
            state: RwLock::new(IndexState {
                id_to_internal: HashMap::new(),
                internal_to_id: Vec::new(),
                deleted: HashSet::new(),
                next_id: 0,
            }),
            collection_id,
            dimension,
        }
    }

    /// File stem for all persisted files of this index.
    fn file_stem(&self) -> String {
        self.collection_id.to_string()
    }

    /// Inserts a document embedding into the index.
    ///
    /// Assigns a new internal usize ID and records the mapping.
    /// If the DocumentId is already present, this is a no-op.
    pub fn insert_document(&self, doc_id: DocumentId, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(RelishError::vector(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| RelishError::vector("Index state lock poisoned"))?;

        // Skip if already inserted (idempotent)
        if state.id_to_internal.contains_key(&doc_id) {
            return Ok(());
        }

        // Assign next sequential internal ID
        let internal_id = state.next_id;
        state.next_id += 1;

        // Record bidirectional mapping
        state.id_to_internal.insert(doc_id, internal_id);
        state.internal_to_id.push(doc_id);

        // Drop the lock before calling hnsw insert (which acquires its own lock)
        drop(state);

        // Insert into HNSW graph (uses interior mutability via parking_lot::RwLock)
        self.hnsw.insert((embedding, internal_id));

        Ok(())
    }

    /// Marks a document as deleted in the index.
    ///
    /// The vector remains in the graph but is excluded from search
    /// results via filtered search. Returns Ok even if the document
    /// is not in the index (idempotent).
    pub fn delete_document(&self, doc_id: DocumentId) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RelishError::vector("Index state lock poisoned"))?;

        if let Some(&internal_id) = state.id_to_internal.get(&doc_id) {
            state.deleted.insert(internal_id);
        }

        Ok(())
    }

    /// Searches for the k nearest documents, excluding deleted ones.
    ///
    /// Returns `(DocumentId, distance)` pairs sorted by distance
    /// ascending (closest first). Distance is cosine distance:
    /// 0.0 = identical, 2.0 = opposite.
    pub fn search_documents(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<(DocumentId, f32)>> {
        if query.len() != self.dimension {
            return Err(RelishError::vector(format!(
                "Query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }

        let state = self
            .state
            .read()
            .map_err(|_| RelishError::vector("Index state lock poisoned"))?;

        // Use filtered search to exclude soft-deleted entries.
        // We create a concrete closure (not a trait object) so it
        // auto-implements hnsw_rs::FilterT via the blanket impl.
        let deleted_ref = &state.deleted;
        let filter_fn = |id: &usize| -> bool { !deleted_ref.contains(id) };
        let results = if state.deleted.is_empty() {
            self.hnsw.search(query, k, ef_search)
        } else {
            self.hnsw
                .search_filter(query, k, ef_search, Some(&filter_fn))
        };

        // Map internal IDs back to DocumentIds
        let mapped: Vec<(DocumentId, f32)> = results
            .into_iter()
            .filter_map(|n| {
                state
                    .internal_to_id
                    .get(n.d_id)
                    .map(|&doc_id| (doc_id, n.distance))
            })
            .collect();

        Ok(mapped)
    }

    /// Returns true if the given document is in the index (and not deleted).
    pub fn contains_document(&self, doc_id: DocumentId) -> bool {
        let state = self.state.read().ok();
        state.is_some_and(|s| {
            s.id_to_internal
                .get(&doc_id)
                .is_some_and(|id| !s.deleted.contains(id))
        })
    }

    /// Returns the number of active (non-deleted) vectors.
    pub fn active_count(&self) -> usize {
        let state = self.state.read().ok();
        state.map_or(0, |s| s.id_to_internal.len() - s.deleted.len())
    }

    /// Returns the total number of vectors (including deleted).
    pub fn total_count(&self) -> usize {
        self.hnsw.get_nb_point()
    }

    /// Restores the deleted set from persisted metadata.
    ///
    /// Called during `Relish::open()` after rebuilding the graph from redb.
    /// Accepts DocumentId UUID strings and maps them to the current
    /// internal IDs (which may differ from the previous session's IDs
    /// after a rebuild).
    pub fn restore_deleted_set(&self, deleted_doc_ids: &[String]) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RelishError::vector("Index state lock poisoned"))?;
        for doc_id_str in deleted_doc_ids {
            // Parse UUID string back to DocumentId
            let uuid = uuid::Uuid::parse_str(doc_id_str)
                .map_err(|e| RelishError::vector(format!("Invalid UUID in deleted set: {}", e)))?;
            let doc_id = DocumentId::from_bytes(*uuid.as_bytes());
            // Map to current internal ID (skip if not found, the document
            // may have been hard-deleted from redb since last save)
            if let Some(&internal_id) = state.id_to_internal.get(&doc_id) {
                state.deleted.insert(internal_id);
            }
        }
        Ok(())
    }

    /// Saves index metadata to a JSON file.
    ///
    /// Creates `{dir}/{collection_uuid}.hnsw.meta` with ID mappings and
    /// the deleted set. Also attempts to save the HNSW graph via
    /// `file_dump` for future optimization (graph loading is not yet
    /// implemented due to lifetime constraints in hnsw_rs).
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .map_err(|e| RelishError::vector(format!("Failed to create HNSW directory: {}", e)))?;

        let state = self
            .state
            .read()
            .map_err(|_| RelishError::vector("Index state lock poisoned"))?;

        // Build metadata
        let metadata = IndexMetadata {
            dimension: self.dimension,
            next_id: state.next_id,
            id_map: state
                .id_to_internal
                .iter()
                .map(|(doc_id, &internal_id)| (doc_id.to_string(), internal_id))
                .collect(),
            deleted: state
                .deleted
                .iter()
                .filter_map(|&internal_id| {
                    state
                        .internal_to_id
                        .get(internal_id)
                        .map(|doc_id| doc_id.to_string())
                })
                .collect(),
        };

        // Write metadata as JSON
        let name = self.file_stem();
        let meta_path = dir.join(format!("{}.hnsw.meta", name));
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| RelishError::vector(format!("Failed to serialize HNSW metadata: {}", e)))?;
        fs::write(&meta_path, json)
            .map_err(|e| RelishError::vector(format!("Failed to write HNSW metadata: {}", e)))?;

        // Also dump the HNSW graph (for future direct-load optimization)
        if state.id_to_internal.is_empty() {
            return Ok(());
        }
        drop(state);

        if let Err(e) = self.hnsw.file_dump(dir, &name) {
            tracing::warn!(error = %e, "Failed to dump HNSW graph (non-fatal, will rebuild on next open)");
        }

        Ok(())
    }

    /// Loads index metadata from a JSON file.
    ///
    /// Returns the metadata needed to rebuild the graph. The caller must
    /// create a new `HnswIndex` and re-insert embeddings using the
    /// stored ID mappings.
    pub(crate) fn load_metadata(
        dir: &Path,
        collection_id: CollectionId,
    ) -> Result<Option<IndexMetadata>> {
        let meta_path = dir.join(format!("{}.hnsw.meta", collection_id));
        if !meta_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&meta_path)
            .map_err(|e| RelishError::vector(format!("Failed to read HNSW metadata: {}", e)))?;
        let metadata: IndexMetadata = serde_json::from_str(&json)
            .map_err(|e| RelishError::vector(format!("Failed to parse HNSW metadata: {}", e)))?;

        Ok(Some(metadata))
    }

    /// Rebuilds an index from a set of embeddings.
    ///
    /// Used during `Relish::open()` to reconstruct the HNSW graph
    /// from embeddings stored in redb (the source of truth).
    pub fn rebuild_from_embeddings(
        collection_id: CollectionId,
        dimension: usize,
        config: &HnswConfig,
        embeddings: Vec<(DocumentId, Vec<f32>)>,
    ) -> Result<Self> {
        let index = Self::new(collection_id, dimension, config);

        if embeddings.is_empty() {
            return Ok(index);
        }

        // Prepare batch data for parallel insertion
        let mut state = index
            .state
            .write()
            .map_err(|_| RelishError::vector("Index state lock poisoned"))?;

        let mut batch: Vec<(&Vec<f32>, usize)> = Vec::with_capacity(embeddings.len());

        for (doc_id, embedding) in &embeddings {
            let internal_id = state.next_id;
            state.next_id += 1;
            state.id_to_internal.insert(*doc_id, internal_id);
            state.internal_to_id.push(*doc_id);
            batch.push((embedding, internal_id));
        }

        drop(state);

        // Parallel bulk insert (uses rayon internally)
        index.hnsw.parallel_insert(&batch);

        Ok(index)
    }

    /// Removes this index's files from disk.
    pub fn remove_files(&self, dir: &Path) -> Result<()> {
        let name = self.file_stem();

        // Remove metadata file
        let meta_path = dir.join(format!("{}.hnsw.meta", name));
        if meta_path.exists() {
            fs::remove_file(&meta_path)
                .map_err(|e| RelishError::vector(format!("Failed to remove HNSW metadata: {}", e)))?;
        }

        // Remove graph dump files (hnsw_rs creates files with the name as prefix)
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let file_str = file_name.to_string_lossy();
                if file_str.starts_with(&name) && file_str.contains("hnswdump") {
                    let _ = fs::remove_file(entry.path());
                }
            }
        }

        Ok(())
    }
}

// ==========================================================================
// VectorIndex trait implementation
// ==========================================================================

impl VectorIndex for HnswIndex {
    fn insert(&self, id: DocumentId, embedding: &[f32]) -> Result<()> {
        self.insert_document(id, embedding)
    }

    fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(DocumentId, f32)>> {
        self.search_documents(query, k, ef_search)
    }

    fn delete(&self, id: DocumentId) -> Result<()> {
        self.delete_document(id)
    }

    fn contains(&self, id: DocumentId) -> bool {
        self.contains_document(id)
    }

    fn len(&self) -> usize {
        self.active_count()
    }

    fn save(&self, dir: &Path) -> Result<()> {
        self.save_to_dir(dir)
    }
}

// ==========================================================================
// Tests
// ==========================================================================
