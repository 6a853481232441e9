//! Type definitions for documents.
//!
//! A **document** is the stored unit of text in relish (a review, or one
//! chunk of a longer text). Each document has text content, an embedding
//! vector for semantic search, and a small typed metadata map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{CollectionId, DocumentId, Timestamp};

// ============================================================================
// MetadataValue
// ============================================================================

/// A typed metadata value attached to a document.
///
/// This is a closed enum rather than free-form JSON because document
/// records are bincode-serialized, and bincode cannot decode
/// self-describing values. The wire layer converts to and from
/// `serde_json::Value` at the boundary via [`to_json`](Self::to_json)
/// and [`from_json`](Self::from_json).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// Boolean flag.
    Boolean(bool),
    /// Signed integer (covers row indexes, counts, ratings).
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
}

impl MetadataValue {
    /// Returns the boolean value, if this is a `Boolean`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an `Integer`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the float value, if this is a `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string value, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts this value to a `serde_json::Value` for the wire layer.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Converts a `serde_json::Value` into a metadata value.
    ///
    /// Returns `None` for JSON shapes that have no metadata
    /// representation (null, arrays, objects). Whole numbers become
    /// `Integer`, other numbers become `Float`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Integer(i))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<usize> for MetadataValue {
    fn from(i: usize) -> Self {
        Self::Integer(i as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

// ============================================================================
// Document — The full stored record
// ============================================================================

/// A stored document.
///
/// Documents belong to exactly one collection. The text and embedding are
/// immutable after creation; re-ingest to change them.
///
/// # Serialization Note
///
/// The `embedding` field is marked `#[serde(skip)]` because embeddings are
/// stored in a separate `EMBEDDINGS_TABLE` for performance. The storage
/// layer reconstitutes the full struct by joining both tables on read.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (UUID v7, time-ordered).
    pub id: DocumentId,

    /// The collection this document belongs to.
    pub collection_id: CollectionId,

    /// The document text. Immutable after creation.
    pub text: String,

    /// Typed metadata map (e.g. `review_idx` for CSV-ingested rows).
    pub metadata: HashMap<String, MetadataValue>,

    /// Semantic embedding vector. Immutable after creation.
    ///
    /// Stored separately in EMBEDDINGS_TABLE; skipped during bincode
    /// serialization of the main document record.
    #[serde(skip)]
    pub embedding: Vec<f32>,

    /// When this document was stored.
    pub created_at: Timestamp,
}

// ============================================================================
// NewDocument — Input for add_document()
// ============================================================================

/// Input for creating a new document via [`Relish::add_document()`](crate::Relish).
///
/// The `id` and `created_at` fields are set automatically by the storage
/// layer.
///
/// # Embedding
///
/// - **External provider**: `embedding` is required (must be `Some`)
/// - **Builtin provider**: `embedding` is optional; if `None`, relish generates it
#[derive(Clone, Debug)]
pub struct NewDocument {
    /// The collection to store this document in.
    pub collection_id: CollectionId,

    /// The document text.
    pub text: String,

    /// Typed metadata map.
    pub metadata: HashMap<String, MetadataValue>,

    /// Pre-computed embedding vector. Required for External provider.
    pub embedding: Option<Vec<f32>>,
}

impl Default for NewDocument {
    fn default() -> Self {
        Self {
            collection_id: CollectionId::nil(),
            text: String::new(),
            metadata: HashMap::new(),
            embedding: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ====================================================================
    // MetadataValue tests
    // ====================================================================

    #[test]
    fn test_metadata_value_from_impls() {
        assert_eq!(MetadataValue::from(true), MetadataValue::Boolean(true));
        assert_eq!(MetadataValue::from(42i64), MetadataValue::Integer(42));
        assert_eq!(MetadataValue::from(7usize), MetadataValue::Integer(7));
        assert_eq!(MetadataValue::from(1.5f64), MetadataValue::Float(1.5));
        assert_eq!(
            MetadataValue::from("spicy"),
            MetadataValue::String("spicy".into())
        );
    }

    #[test]
    fn test_metadata_value_accessors() {
        assert_eq!(MetadataValue::Boolean(true).as_bool(), Some(true));
        assert_eq!(MetadataValue::Integer(3).as_i64(), Some(3));
        assert_eq!(MetadataValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(MetadataValue::String("a".into()).as_str(), Some("a"));
        // Cross-type access returns None
        assert_eq!(MetadataValue::Integer(3).as_str(), None);
        assert_eq!(MetadataValue::String("a".into()).as_i64(), None);
    }

    #[test]
    fn test_metadata_value_bincode_roundtrip() {
        let values = vec![
            MetadataValue::Boolean(false),
            MetadataValue::Integer(-9),
            MetadataValue::Float(2.25),
            MetadataValue::String("great pad thai".into()),
        ];
        for value in values {
            let bytes = bincode::serialize(&value).unwrap();
            let restored: MetadataValue = bincode::deserialize(&bytes).unwrap();
            assert_eq!(value, restored);
        }
    }

    #[test]
    fn test_metadata_value_json_roundtrip() {
        let values = vec![
            MetadataValue::Boolean(true),
            MetadataValue::Integer(123),
            MetadataValue::Float(0.75),
            MetadataValue::String("five stars".into()),
        ];
        for value in values {
            let json = value.to_json();
            let restored = MetadataValue::from_json(&json).unwrap();
            assert_eq!(value, restored);
        }
    }

    #[test]
    fn test_metadata_value_from_json_rejects_compound() {
        assert!(MetadataValue::from_json(&serde_json::Value::Null).is_none());
        assert!(MetadataValue::from_json(&serde_json::json!([1, 2])).is_none());
        assert!(MetadataValue::from_json(&serde_json::json!({"a": 1})).is_none());
    }

    #[test]
    fn test_metadata_value_from_json_whole_number_is_integer() {
        let value = MetadataValue::from_json(&serde_json::json!(42)).unwrap();
        assert_eq!(value, MetadataValue::Integer(42));

        let value = MetadataValue::from_json(&serde_json::json!(42.5)).unwrap();
        assert_eq!(value, MetadataValue::Float(42.5));
    }

    // ====================================================================
    // Document tests
    // ====================================================================

    #[test]
    fn test_document_bincode_roundtrip() {
        let mut metadata = HashMap::new();
        metadata.insert("review_idx".to_string(), MetadataValue::Integer(17));

        let doc = Document {
            id: DocumentId::new(),
            collection_id: CollectionId::new(),
            text: "The noodles were incredible, service a bit slow.".into(),
            metadata,
            embedding: vec![0.1, 0.2, 0.3], // will be skipped by serde
            created_at: Timestamp::now(),
        };

        let bytes = bincode::serialize(&doc).unwrap();
        let restored: Document = bincode::deserialize(&bytes).unwrap();

        assert_eq!(doc.id, restored.id);
        assert_eq!(doc.collection_id, restored.collection_id);
        assert_eq!(doc.text, restored.text);
        assert_eq!(doc.metadata, restored.metadata);
        // Embedding is skipped, so restored should be empty
        assert!(restored.embedding.is_empty());
        assert_eq!(doc.created_at, restored.created_at);
    }

    #[test]
    fn test_document_embedding_skipped_in_serialization() {
        let doc = Document {
            id: DocumentId::new(),
            collection_id: CollectionId::new(),
            text: "test".into(),
            metadata: HashMap::new(),
            embedding: vec![1.0; 384], // 384 floats = 1,536 bytes
            created_at: Timestamp::now(),
        };

        let bytes = bincode::serialize(&doc).unwrap();
        // If embedding were included, size would be > 1,536 bytes.
        // With skip, it should be much smaller.
        assert!(
            bytes.len() < 500,
            "Serialized size {} suggests embedding was not skipped",
            bytes.len()
        );
    }

    // ====================================================================
    // NewDocument tests
    // ====================================================================

    #[test]
    fn test_new_document_default() {
        let nd = NewDocument::default();
        assert_eq!(nd.collection_id, CollectionId::nil());
        assert!(nd.text.is_empty());
        assert!(nd.metadata.is_empty());
        assert!(nd.embedding.is_none());
    }
}
