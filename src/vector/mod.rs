//! Vector index abstractions for nearest-neighbour retrieval.
//!
//! This module provides a trait-based abstraction over vector indexes,
//! allowing different ANN (Approximate Nearest Neighbor) backends.
//! The primary implementation uses [`hnsw_rs`] (pure Rust).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │         VectorIndex trait         │
//! └──────────┬───────────────────────┘
//!            │
//!    ┌───────┴────────┐
//!    │   HnswIndex    │  (hnsw_rs wrapper, one per collection)
//!    └────────────────┘
//! ```
//!
//! Embeddings stored in redb are the **source of truth**. The HNSW index
//! is a derived, rebuildable structure: if files are missing or corrupt,
//! rebuild from stored embeddings.

mod hnsw;

pub use hnsw::HnswIndex;

use std::path::Path;

use crate::error::Result;
use crate::types::DocumentId;

/// Vector index trait for approximate nearest neighbor search.
///
/// Implementations must be `Send + Sync` for use inside `Relish`.
///
/// All mutating methods (`insert`, `delete`) take `&self` and use
/// interior mutability. This enables concurrent reads during search
/// while writes are serialized internally.
pub trait VectorIndex: Send + Sync {
    /// Inserts a document embedding into the index.
    ///
    /// Re-inserting an ID that is already present is a no-op.
    fn insert(&self, id: DocumentId, embedding: &[f32]) -> Result<()>;

    /// Searches for the k nearest neighbours to the query vector.
    ///
    /// Returns `(id, distance)` pairs sorted by distance ascending
    /// (closest first). Distance metric is cosine distance:
    /// 0.0 = identical, 2.0 = opposite.
    fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(DocumentId, f32)>>;

    /// Marks a document as deleted (soft-delete).
    ///
    /// The vector remains in the graph but is excluded from search
    /// results. HNSW graphs don't support point removal, since removing
    /// nodes breaks proximity edges that other nodes rely on.
    fn delete(&self, id: DocumentId) -> Result<()>;

    /// Returns true if the document is indexed and not deleted.
    fn contains(&self, id: DocumentId) -> bool;

    /// Returns the number of active (non-deleted) vectors.
    fn len(&self) -> usize;

    /// Returns true if the index has no active vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persists index metadata to disk.
    fn save(&self, dir: &Path) -> Result<()>;
}
