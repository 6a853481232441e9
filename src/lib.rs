//! # relish
//!
//! Embedded semantic retrieval engine for review corpora - similarity-scored
//! search over embedded documents.
//!
//! relish stores text documents with their embedding vectors, keeps a
//! per-collection HNSW index over them, and answers free-text queries with
//! similarity-scored results.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relish::{Relish, Config, IngestOptions, SearchOptions};
//!
//! // Open or create an engine with built-in embedding generation
//! let db = Relish::open("./relish.db", Config::with_builtin_embeddings())?;
//!
//! // Build the review collection from a CSV file
//! let report = db.ingest_csv("data/Restaurant Reviews.csv", IngestOptions::default())?;
//! println!("stored {} documents", report.documents_written);
//!
//! // Ask it something
//! let results = db.search("what do people say about the ice cream?", SearchOptions::default())?;
//! for hit in &results {
//!     println!("{:.4}  {}", hit.similarity, hit.text);
//! }
//!
//! // Clean up
//! db.close()?;
//! ```
//!
//! ## Key Concepts
//!
//! ### Collection
//!
//! A **collection** is an isolated namespace for documents, typically one per
//! corpus. Each collection has its own vector index and a fixed embedding
//! dimension.
//!
//! ### Document
//!
//! A **document** is one stored text (a review, or one chunk of a longer
//! text). It carries:
//! - Text content
//! - Embedding (vector representation for semantic search)
//! - A small typed metadata map
//!
//! ### Scoring
//!
//! Search converts each neighbour's cosine distance into a similarity score
//! with `1 / (1 + distance)`, drops results below the threshold, and rounds
//! scores to four decimals for display. Results come back ordered by
//! ascending distance.
//!
//! ### Embedding Providers
//!
//! relish supports two modes for embeddings:
//!
//! - **External** (default): You provide pre-computed embeddings from your own
//!   service (OpenAI, Cohere, etc.). Text search and CSV ingestion are
//!   unavailable since the engine cannot embed queries.
//! - **Builtin**: relish generates embeddings using a bundled ONNX model
//!   (requires `builtin-embeddings` feature)
//!
//! A third path is [`Relish::open_with_embedding`], which accepts any
//! [`embedding::EmbeddingService`] implementation.
//!
//! ## Features
//!
//! - `builtin-embeddings` - Enable built-in ONNX embedding generation
//!
//! ## Thread Safety
//!
//! `Relish` is `Send + Sync` and can be shared across threads using `Arc`.
//! The storage layer uses MVCC for concurrent reads with exclusive write
//! locking.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod db;
mod error;
mod types;

pub mod embedding;
pub mod storage;

// Domain modules
mod collection;
mod document;
mod ingest;
mod search;

/// JSON payload types for the search surface.
pub mod api;

/// Vector index module for HNSW-based approximate nearest neighbor search.
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main engine interface
pub use db::Relish;

// Configuration
pub use config::{
    ChunkConfig, Config, EmbeddingDimension, EmbeddingProvider, HnswConfig, SyncMode,
};

// Error handling
pub use error::{NotFoundError, RelishError, Result, StorageError, ValidationError};

// Core types
pub use types::{CollectionId, DocumentId, Embedding, Timestamp};

// Domain types
pub use collection::Collection;
pub use document::{Document, MetadataValue, NewDocument};

// Search and ingestion
pub use ingest::{IngestOptions, IngestReport};
pub use search::{similarity_from_distance, ScoredResult, SearchOptions};

// Storage (for advanced users)
pub use storage::DatabaseMetadata;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common relish usage.
///
/// ```rust
/// use relish::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{Config, EmbeddingDimension, SyncMode};
    pub use crate::db::Relish;
    pub use crate::document::{Document, MetadataValue, NewDocument};
    pub use crate::error::{RelishError, Result};
    pub use crate::ingest::{IngestOptions, IngestReport};
    pub use crate::search::{ScoredResult, SearchOptions};
    pub use crate::types::{CollectionId, DocumentId, Timestamp};
}
