//! Collection management module.
//!
//! A **collection** is an isolated namespace for documents, typically one
//! per corpus. Each collection has:
//! - Unique ID (UUID v7)
//! - Name and optional description
//! - Fixed embedding dimension (set at creation)
//! - Its own vector index
//!
//! # Operations
//!
//! All collection operations are available on [`Relish`](crate::Relish):
//!
//! - [`create_collection(name)`](crate::Relish::create_collection)
//! - [`create_collection_with_description(name, desc)`](crate::Relish::create_collection_with_description)
//! - [`get_collection(id)`](crate::Relish::get_collection)
//! - [`find_collection(name)`](crate::Relish::find_collection)
//! - [`list_collections()`](crate::Relish::list_collections)
//! - [`document_count(id)`](crate::Relish::document_count)
//! - [`delete_collection(id)`](crate::Relish::delete_collection)
//!
//! # Example
//!
//! ```rust,ignore
//! use relish::{Relish, Config};
//!
//! let db = Relish::open("./relish.db", Config::default())?;
//!
//! // Create a collection
//! let id = db.create_collection("my-reviews")?;
//!
//! // Get collection info
//! if let Some(collection) = db.get_collection(id)? {
//!     println!("Collection: {}", collection.name);
//! }
//!
//! // List all collections
//! for collection in db.list_collections()? {
//!     println!("- {}: {}", collection.id, collection.name);
//! }
//!
//! // Delete when no longer needed
//! db.delete_collection(id)?;
//! ```

pub mod types;

pub use types::Collection;

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::db::Relish;
use crate::error::{NotFoundError, Result, ValidationError};
use crate::storage::schema::MAX_COLLECTION_NAME_LENGTH;
use crate::types::CollectionId;
use crate::vector::HnswIndex;

/// Validates a collection name.
///
/// Names must be non-empty after trimming and at most 128 characters.
pub(crate) fn validate_collection_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::required_field("name").into());
    }
    if name.len() > MAX_COLLECTION_NAME_LENGTH {
        return Err(ValidationError::invalid_field(
            "name",
            format!(
                "exceeds max length of {} chars (got {})",
                MAX_COLLECTION_NAME_LENGTH,
                name.len()
            ),
        )
        .into());
    }
    Ok(())
}

impl Relish {
    /// Creates a new collection with the engine's embedding dimension.
    ///
    /// Registers an empty vector index for the collection.
    ///
    /// # Errors
    /// - `Validation` if the name is empty, too long, or already taken
    /// - `Storage` / `Vector` on persistence or index failure
    #[instrument(skip(self))]
    pub fn create_collection(&self, name: &str) -> Result<CollectionId> {
        self.create_collection_inner(name, None)
    }

    /// Creates a new collection with a description.
    ///
    /// See [`create_collection`](Self::create_collection).
    #[instrument(skip(self, description))]
    pub fn create_collection_with_description(
        &self,
        name: &str,
        description: &str,
    ) -> Result<CollectionId> {
        self.create_collection_inner(name, Some(description))
    }

    fn create_collection_inner(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<CollectionId> {
        validate_collection_name(name)?;

        if self.storage().find_collection_by_name(name)?.is_some() {
            return Err(ValidationError::invalid_field(
                "name",
                format!("collection '{}' already exists", name),
            )
            .into());
        }

        let dimension = self.embedding_dimension() as u16;
        let collection = match description {
            Some(description) => Collection::with_description(name, description, dimension),
            None => Collection::new(name, dimension),
        };

        self.storage().save_collection(&collection)?;

        let index = HnswIndex::new(collection.id, dimension as usize, &self.config().hnsw);
        self.register_index(collection.id, Arc::new(index));

        info!(collection_id = %collection.id, name, "Created collection");
        Ok(collection.id)
    }

    /// Fetches a collection by ID.
    ///
    /// Returns `Ok(None)` if no collection has this ID.
    pub fn get_collection(&self, id: CollectionId) -> Result<Option<Collection>> {
        self.storage().get_collection(id)
    }

    /// Fetches a collection by name.
    ///
    /// Returns `Ok(None)` if no collection has this name.
    pub fn find_collection(&self, name: &str) -> Result<Option<Collection>> {
        self.storage().find_collection_by_name(name)
    }

    /// Lists all collections.
    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        self.storage().list_collections()
    }

    /// Returns the number of documents stored in a collection.
    ///
    /// # Errors
    /// Returns `NotFound` if the collection does not exist.
    pub fn document_count(&self, id: CollectionId) -> Result<usize> {
        if self.storage().get_collection(id)?.is_none() {
            return Err(NotFoundError::collection(id).into());
        }
        self.storage().document_count(id)
    }

    /// Deletes a collection and everything in it.
    ///
    /// Cascades to the collection's documents, their embeddings, the
    /// in-memory index, and the index files on disk.
    ///
    /// # Errors
    /// Returns `NotFound` if the collection does not exist.
    #[instrument(skip(self))]
    pub fn delete_collection(&self, id: CollectionId) -> Result<()> {
        let collection = self
            .storage()
            .get_collection(id)?
            .ok_or_else(|| NotFoundError::collection(id))?;

        let removed = self.storage().delete_documents_in_collection(id)?;
        self.storage().delete_collection(id)?;

        if let Some(index) = self.remove_index(id) {
            if let Err(err) = index.remove_files(self.index_dir()) {
                // Orphaned index files are harmless; the graph is rebuilt
                // from storage on open anyway.
                warn!(collection_id = %id, error = %err, "Failed to remove index files");
            }
        }

        info!(
            collection_id = %id,
            name = %collection.name,
            documents_removed = removed,
            "Deleted collection"
        );
        Ok(())
    }
}
