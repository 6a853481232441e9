//! Type definitions for collections.
//!
//! A **collection** is an isolated namespace for documents, typically one per corpus.
//! Each collection has its own embedding dimension and vector index.

use serde::{Deserialize, Serialize};

use crate::types::{CollectionId, Timestamp};

/// A collection — an isolated namespace for documents.
///
/// Collections keep corpora separate: each ingested dataset gets its own
/// collection with its own documents and vector index.
///
/// # Fields
///
/// - `id` — Unique identifier (UUID v7, time-ordered)
/// - `name` — Human-readable name (e.g., "restaurant_reviews")
/// - `description` — Optional note about the corpus
/// - `embedding_dimension` — Vector dimension locked at creation (e.g., 384, 768)
/// - `created_at` / `updated_at` — Lifecycle timestamps
///
/// # Serialization
///
/// Collections are serialized with bincode for compact storage in redb.
/// The `Serialize`/`Deserialize` derives enable this automatically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Collection {
    /// Unique identifier (UUID v7).
    pub id: CollectionId,

    /// Human-readable name.
    pub name: String,

    /// Optional description of the corpus this collection holds.
    pub description: Option<String>,

    /// Embedding vector dimension for this collection.
    ///
    /// All documents in this collection must have embeddings
    /// with exactly this many dimensions. Locked at creation time.
    pub embedding_dimension: u16,

    /// When this collection was created.
    pub created_at: Timestamp,

    /// When this collection was last modified.
    pub updated_at: Timestamp,
}

impl Collection {
    /// Creates a new collection with the given name and embedding dimension.
    ///
    /// Sets `created_at` and `updated_at` to the current time.
    /// The `description` defaults to `None`.
    pub fn new(name: impl Into<String>, embedding_dimension: u16) -> Self {
        let now = Timestamp::now();
        Self {
            id: CollectionId::new(),
            name: name.into(),
            description: None,
            embedding_dimension,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a new collection with a description.
    pub fn with_description(
        name: impl Into<String>,
        description: impl Into<String>,
        embedding_dimension: u16,
    ) -> Self {
        let mut collection = Self::new(name, embedding_dimension);
        collection.description = Some(description.into());
        collection
    }
}
