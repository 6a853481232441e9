//! Document management module.
//!
//! A **document** is the stored unit of text in relish (a review, or one
//! chunk of a longer text). Documents have text content, a semantic
//! embedding for vector search, and a small typed metadata map.
//!
//! # Operations
//!
//! All document operations are available on [`Relish`](crate::Relish):
//!
//! - [`add_document(doc)`](crate::Relish::add_document)
//! - [`get_document(id)`](crate::Relish::get_document)
//! - [`delete_document(id)`](crate::Relish::delete_document)

pub mod types;

pub use types::{Document, MetadataValue, NewDocument};

use tracing::{debug, instrument};

use crate::db::Relish;
use crate::error::{NotFoundError, RelishError, Result, ValidationError};
use crate::storage::schema::{MAX_METADATA_ENTRIES, MAX_METADATA_KEY_LENGTH, MAX_TEXT_SIZE};
use crate::types::{DocumentId, Timestamp};

/// Validates a [`NewDocument`] before storage.
///
/// # Rules
///
/// - `text`: non-empty after trimming, max 100 KiB
/// - `metadata`: max 32 entries, each key max 128 chars
/// - `embedding`: required if `is_external_provider`; dimension must match
///   the collection
pub(crate) fn validate_new_document(
    doc: &NewDocument,
    expected_dimension: u16,
    is_external_provider: bool,
) -> Result<()> {
    // Text: non-empty after trimming
    if doc.text.trim().is_empty() {
        return Err(ValidationError::required_field("text").into());
    }

    // Text: max size
    if doc.text.len() > MAX_TEXT_SIZE {
        return Err(ValidationError::content_too_large(doc.text.len(), MAX_TEXT_SIZE).into());
    }

    // Metadata: entry count limit
    if doc.metadata.len() > MAX_METADATA_ENTRIES {
        return Err(ValidationError::too_many_items(
            "metadata",
            doc.metadata.len(),
            MAX_METADATA_ENTRIES,
        )
        .into());
    }

    // Metadata: key length limit
    for key in doc.metadata.keys() {
        if key.len() > MAX_METADATA_KEY_LENGTH {
            return Err(ValidationError::invalid_field(
                "metadata",
                format!(
                    "key '{}' exceeds max length of {} chars (got {})",
                    key,
                    MAX_METADATA_KEY_LENGTH,
                    key.len()
                ),
            )
            .into());
        }
    }

    // Embedding: required for external provider
    if is_external_provider && doc.embedding.is_none() {
        return Err(ValidationError::required_field(
            "embedding (required when using External embedding provider)",
        )
        .into());
    }

    // Embedding: dimension check
    if let Some(ref emb) = doc.embedding {
        if emb.len() != expected_dimension as usize {
            return Err(
                ValidationError::dimension_mismatch(expected_dimension as usize, emb.len()).into(),
            );
        }
    }

    Ok(())
}

impl Relish {
    /// Stores a document in its collection and indexes its embedding.
    ///
    /// With the External provider the embedding must be supplied in
    /// `doc.embedding`; with Builtin it is generated from the text when
    /// `None`.
    ///
    /// # Errors
    /// - `NotFound` if the collection does not exist
    /// - `Validation` if the text, metadata, or embedding is invalid
    /// - `Embedding` if builtin generation fails
    /// - `Storage` / `Vector` on persistence or index failure
    #[instrument(skip(self, doc), fields(collection_id = %doc.collection_id))]
    pub fn add_document(&self, doc: NewDocument) -> Result<DocumentId> {
        let collection = self
            .storage()
            .get_collection(doc.collection_id)?
            .ok_or_else(|| NotFoundError::collection(doc.collection_id))?;

        validate_new_document(
            &doc,
            collection.embedding_dimension,
            self.config().embedding_provider.is_external(),
        )?;

        let embedding = match doc.embedding {
            Some(embedding) => embedding,
            None => self.embedding().embed(&doc.text)?,
        };

        let document = Document {
            id: DocumentId::new(),
            collection_id: doc.collection_id,
            text: doc.text,
            metadata: doc.metadata,
            embedding,
            created_at: Timestamp::now(),
        };

        self.storage().save_document(&document)?;

        let index = self.index_for(document.collection_id).ok_or_else(|| {
            RelishError::vector(format!(
                "no index registered for collection {}",
                document.collection_id
            ))
        })?;
        index.insert_document(document.id, &document.embedding)?;

        debug!(document_id = %document.id, "Stored document");
        Ok(document.id)
    }

    /// Fetches a document by ID, embedding included.
    ///
    /// Returns `Ok(None)` if no document has this ID.
    pub fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        self.storage().get_document(id)
    }

    /// Deletes a document and its embedding, and marks its index entry
    /// as removed.
    ///
    /// # Errors
    /// Returns `NotFound` if the document does not exist.
    #[instrument(skip(self))]
    pub fn delete_document(&self, id: DocumentId) -> Result<()> {
        let document = self
            .storage()
            .get_document(id)?
            .ok_or_else(|| NotFoundError::document(id))?;

        self.storage().delete_document(id)?;

        // The collection (and its index) may already be gone; storage
        // cleanup above is what matters then.
        if let Some(index) = self.index_for(document.collection_id) {
            index.delete_document(id)?;
        }

        debug!(document_id = %id, collection_id = %document.collection_id, "Deleted document");
        Ok(())
    }
}
