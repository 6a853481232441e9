//! Database schema definitions and versioning.
//!
//! This module defines the table structure for the redb storage engine.
//! All table definitions are compile-time constants to ensure consistency.
//!
//! # Schema Versioning
//!
//! The schema version is stored in the metadata table. When opening an
//! existing database, we check the version and fail if it doesn't match.
//! Migration support will be added in a future release.
//!
//! # Table Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_TABLE                                               │
//! │   Key: &str                                                  │
//! │   Value: &[u8] (bincode-serialized)                          │
//! │   Entries: "db_metadata" -> DatabaseMetadata                 │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ COLLECTIONS_TABLE                                            │
//! │   Key: &[u8; 16] (CollectionId as UUID bytes)               │
//! │   Value: &[u8] (bincode-serialized Collection)              │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ DOCUMENTS_TABLE                                              │
//! │   Key: &[u8; 16] (DocumentId as UUID bytes)                 │
//! │   Value: &[u8] (bincode-serialized Document)                │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ DOCUMENTS_BY_COLLECTION_TABLE (multimap)                     │
//! │   Key: &[u8; 16] (CollectionId as UUID bytes)               │
//! │   Value: &[u8; 16] (DocumentId as UUID bytes)               │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ EMBEDDINGS_TABLE                                             │
//! │   Key: &[u8; 16] (DocumentId as UUID bytes)                 │
//! │   Value: &[u8] (raw little-endian f32 bytes)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use redb::{MultimapTableDefinition, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingDimension;
use crate::error::StorageError;
use crate::types::Timestamp;

/// Current schema version.
///
/// Increment this when making breaking changes to the schema.
/// The database will refuse to open if versions don't match.
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum document text size in bytes (100 KiB).
pub const MAX_TEXT_SIZE: usize = 100 * 1024;

/// Maximum number of metadata entries per document.
pub const MAX_METADATA_ENTRIES: usize = 32;

/// Maximum length of a single metadata key.
pub const MAX_METADATA_KEY_LENGTH: usize = 128;

/// Maximum length of a collection name.
pub const MAX_COLLECTION_NAME_LENGTH: usize = 128;

// ============================================================================
// Table Definitions
// ============================================================================

/// Metadata table for database-level information.
///
/// Stores schema version, creation time, and other database-wide settings.
/// Key is a string identifier, value is serialized data.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Collections table.
///
/// Key: CollectionId as 16-byte UUID
/// Value: bincode-serialized Collection struct
pub const COLLECTIONS_TABLE: TableDefinition<&[u8; 16], &[u8]> =
    TableDefinition::new("collections");

/// Documents table.
///
/// Key: DocumentId as 16-byte UUID
/// Value: bincode-serialized Document struct (without embedding)
pub const DOCUMENTS_TABLE: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("documents");

/// Index: documents by collection.
///
/// Enables listing and cascading deletes per collection without scanning
/// the documents table.
/// Key: CollectionId as 16-byte UUID
/// Value: DocumentId as 16-byte UUID
pub const DOCUMENTS_BY_COLLECTION_TABLE: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("documents_by_collection");

/// Embeddings table.
///
/// Stored separately from documents to keep the main table compact.
/// Key: DocumentId as 16-byte UUID
/// Value: raw f32 bytes (dimension * 4 bytes, little-endian)
pub const EMBEDDINGS_TABLE: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("embeddings");

// ============================================================================
// Database Metadata
// ============================================================================

/// Database metadata stored in the metadata table.
///
/// This is serialized with bincode and stored under the key "db_metadata".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Embedding dimension configured for this database.
    ///
    /// Once set, this cannot be changed without recreating the database.
    pub embedding_dimension: EmbeddingDimension,

    /// Timestamp when the database was created.
    pub created_at: Timestamp,

    /// Last time the database was opened (updated on each open).
    pub last_opened_at: Timestamp,
}

impl DatabaseMetadata {
    /// Creates new metadata for a fresh database.
    pub fn new(embedding_dimension: EmbeddingDimension) -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            embedding_dimension,
            created_at: now,
            last_opened_at: now,
        }
    }

    /// Updates the last_opened_at timestamp.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks if this metadata is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

// ============================================================================
// Embedding Encoding Helpers
// ============================================================================

/// Encodes an embedding as raw little-endian f32 bytes.
///
/// This avoids bincode framing overhead for the hot embedding table and
/// keeps values readable with external tools.
#[inline]
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes raw little-endian f32 bytes back into an embedding.
///
/// # Errors
/// Returns `StorageError::Corrupted` if the byte length is not a multiple
/// of 4 (a partial write or foreign data).
#[inline]
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, StorageError> {
    if bytes.len() % 4 != 0 {
        return Err(StorageError::corrupted(format!(
            "embedding byte length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
