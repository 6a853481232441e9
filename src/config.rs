//! Configuration types for relish.
//!
//! The [`Config`] struct controls engine behavior including:
//! - Embedding provider (builtin ONNX or external)
//! - Embedding dimension (384, 768, or custom)
//! - Search defaults (top-k, similarity threshold)
//! - CSV ingestion defaults and HNSW index tuning
//!
//! # Example
//! ```rust
//! use relish::{Config, EmbeddingProvider, EmbeddingDimension, SyncMode};
//!
//! // Use defaults (External provider, 384 dimensions)
//! let config = Config::default();
//!
//! // Customize for production
//! let config = Config {
//!     embedding_dimension: EmbeddingDimension::D768,
//!     default_top_k: 10,
//!     sync_mode: SyncMode::Normal,
//!     ..Default::default()
//! };
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Engine configuration options.
///
/// All fields have sensible defaults matching a small review-search
/// deployment. Use struct update syntax to override specific settings:
///
/// ```rust
/// use relish::Config;
///
/// let config = Config {
///     default_top_k: 20,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// How embeddings are generated or provided.
    pub embedding_provider: EmbeddingProvider,

    /// Embedding vector dimension (must match provider output).
    pub embedding_dimension: EmbeddingDimension,

    /// Collection used by [`search`] and [`ingest_csv`] when the caller
    /// names none.
    ///
    /// [`search`]: crate::Relish::search
    /// [`ingest_csv`]: crate::Relish::ingest_csv
    pub default_collection: String,

    /// Number of neighbors a search returns when the request leaves
    /// `top_k` unset. Must be between 1 and 1000.
    pub default_top_k: usize,

    /// Minimum similarity a neighbor must reach to appear in search
    /// results, applied before display rounding. Must be finite.
    pub similarity_threshold: f32,

    /// CSV column read as document text during ingestion.
    pub text_column: String,

    /// Optional text chunking for long documents during ingestion.
    ///
    /// `None` stores each CSV row as a single document. Reviews are
    /// short, so that is the default.
    pub chunking: Option<ChunkConfig>,

    /// Number of texts embedded per batch during CSV ingestion.
    pub ingest_batch_size: usize,

    /// HNSW index construction and search parameters.
    pub hnsw: HnswConfig,

    /// Durability mode for write operations.
    pub sync_mode: SyncMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // External is the safe default - no ONNX dependency required
            embedding_provider: EmbeddingProvider::External,
            // 384 matches all-MiniLM-L6-v2, the default builtin model
            embedding_dimension: EmbeddingDimension::D384,
            default_collection: "restaurant_reviews".to_string(),
            default_top_k: 5,
            similarity_threshold: 0.5,
            text_column: "Review Text".to_string(),
            chunking: None,
            ingest_batch_size: 256,
            hnsw: HnswConfig::default(),
            sync_mode: SyncMode::Normal,
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Config for builtin embedding generation.
    ///
    /// This requires the `builtin-embeddings` feature to be enabled.
    ///
    /// # Example
    /// ```rust
    /// use relish::Config;
    ///
    /// let config = Config::with_builtin_embeddings();
    /// ```
    pub fn with_builtin_embeddings() -> Self {
        Self {
            embedding_provider: EmbeddingProvider::Builtin { model_path: None },
            ..Default::default()
        }
    }

    /// Creates a Config for external embedding provider.
    ///
    /// When using external embeddings, you must provide pre-computed
    /// embedding vectors when adding documents.
    ///
    /// # Example
    /// ```rust
    /// use relish::{Config, EmbeddingDimension};
    ///
    /// // OpenAI ada-002 uses 1536 dimensions
    /// let config = Config::with_external_embeddings(EmbeddingDimension::Custom(1536));
    /// ```
    pub fn with_external_embeddings(dimension: EmbeddingDimension) -> Self {
        Self {
            embedding_provider: EmbeddingProvider::External,
            embedding_dimension: dimension,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `Relish::open()`. You can also call this
    /// explicitly to check configuration before attempting to open.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - `default_top_k` is 0 or exceeds 1000
    /// - `similarity_threshold` is NaN or infinite
    /// - `default_collection` or `text_column` is empty
    /// - `ingest_batch_size` is 0
    /// - Custom dimension is 0 or > 4096
    /// - Chunking or HNSW parameters are out of range
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_top_k == 0 {
            return Err(ValidationError::invalid_field(
                "default_top_k",
                "must be greater than 0",
            ));
        }
        if self.default_top_k > 1000 {
            return Err(ValidationError::invalid_field(
                "default_top_k",
                "must not exceed 1000",
            ));
        }

        if !self.similarity_threshold.is_finite() {
            return Err(ValidationError::invalid_field(
                "similarity_threshold",
                "must be a finite number",
            ));
        }

        if self.default_collection.is_empty() {
            return Err(ValidationError::required_field("default_collection"));
        }

        if self.text_column.is_empty() {
            return Err(ValidationError::required_field("text_column"));
        }

        if self.ingest_batch_size == 0 {
            return Err(ValidationError::invalid_field(
                "ingest_batch_size",
                "must be greater than 0",
            ));
        }

        // Validate custom dimension bounds
        if let EmbeddingDimension::Custom(dim) = self.embedding_dimension {
            if dim == 0 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must be greater than 0",
                ));
            }
            if dim > 4096 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must not exceed 4096",
                ));
            }
        }

        if let Some(chunking) = &self.chunking {
            chunking.validate()?;
        }

        self.hnsw.validate()?;

        Ok(())
    }

    /// Returns the embedding dimension as a numeric value.
    pub fn dimension(&self) -> usize {
        self.embedding_dimension.size()
    }
}

/// Text chunking parameters for CSV ingestion.
///
/// Long texts are split into windows of `size` characters, each window
/// starting `size - overlap` characters after the previous one. The final
/// window may be shorter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Window length in characters.
    pub size: usize,

    /// Characters shared between consecutive windows.
    pub overlap: usize,
}

impl ChunkConfig {
    /// Creates a chunk configuration.
    pub const fn new(size: usize, overlap: usize) -> Self {
        Self { size, overlap }
    }

    /// Validates chunking parameters.
    ///
    /// # Errors
    /// Returns `ValidationError` if `size` is 0 or `overlap >= size`
    /// (the window would never advance).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.size == 0 {
            return Err(ValidationError::invalid_field(
                "chunking.size",
                "must be greater than 0",
            ));
        }
        if self.overlap >= self.size {
            return Err(ValidationError::invalid_field(
                "chunking.overlap",
                "must be smaller than chunk size",
            ));
        }
        Ok(())
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: 512,
            overlap: 64,
        }
    }
}

/// HNSW index tuning parameters.
///
/// Defaults favor recall over memory for collections up to ~100k
/// documents. See the hnsw_rs documentation for parameter semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum neighbors per node per layer (M in the HNSW paper).
    pub max_nb_connection: usize,

    /// Candidate list size during index construction.
    pub ef_construction: usize,

    /// Candidate list size during search. Raised to the requested k
    /// when a search asks for more neighbors than this.
    pub ef_search: usize,

    /// Maximum number of layers in the index.
    pub max_layer: usize,

    /// Capacity hint for index allocation.
    pub max_elements: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            max_nb_connection: 16,
            ef_construction: 200,
            ef_search: 50,
            max_layer: 16,
            max_elements: 100_000,
        }
    }
}

impl HnswConfig {
    /// Validates HNSW parameters against hnsw_rs limits.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_nb_connection == 0 || self.max_nb_connection > 256 {
            return Err(ValidationError::invalid_field(
                "hnsw.max_nb_connection",
                "must be between 1 and 256",
            ));
        }
        if self.ef_construction == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_construction",
                "must be greater than 0",
            ));
        }
        if self.ef_search == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_search",
                "must be greater than 0",
            ));
        }
        // hnsw_rs caps layers at 16
        if self.max_layer == 0 || self.max_layer > 16 {
            return Err(ValidationError::invalid_field(
                "hnsw.max_layer",
                "must be between 1 and 16",
            ));
        }
        if self.max_elements == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.max_elements",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Embedding provider configuration.
///
/// Determines how embedding vectors are generated for documents and
/// search queries.
#[derive(Clone, Debug)]
pub enum EmbeddingProvider {
    /// relish generates embeddings using a built-in ONNX model.
    ///
    /// Requires the `builtin-embeddings` feature. The default model is
    /// all-MiniLM-L6-v2 (384 dimensions).
    Builtin {
        /// Custom ONNX model path. If `None`, uses the bundled model.
        model_path: Option<PathBuf>,
    },

    /// Caller provides pre-computed embedding vectors.
    ///
    /// Use this when you have your own embedding service (OpenAI, Cohere, etc.)
    /// or want to use a model not bundled with relish. Text search and CSV
    /// ingestion are unavailable in this mode since the engine cannot embed
    /// on its own.
    External,
}

impl EmbeddingProvider {
    /// Returns true if this is the builtin provider.
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin { .. })
    }

    /// Returns true if this is the external provider.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External)
    }
}

/// Embedding vector dimensions.
///
/// Standard dimensions are provided for common models. Use `Custom` for
/// other embedding services.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingDimension {
    /// 384 dimensions (all-MiniLM-L6-v2, default builtin model).
    #[default]
    D384,

    /// 768 dimensions (bge-base-en-v1.5, BERT-base).
    D768,

    /// Custom dimension for other embedding models.
    ///
    /// Must be between 1 and 4096.
    Custom(usize),
}

impl EmbeddingDimension {
    /// Returns the numeric size of this dimension.
    ///
    /// # Example
    /// ```rust
    /// use relish::EmbeddingDimension;
    ///
    /// assert_eq!(EmbeddingDimension::D384.size(), 384);
    /// assert_eq!(EmbeddingDimension::D768.size(), 768);
    /// assert_eq!(EmbeddingDimension::Custom(1536).size(), 1536);
    /// ```
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::D384 => 384,
            Self::D768 => 768,
            Self::Custom(n) => *n,
        }
    }
}

/// Durability mode for write operations.
///
/// Controls the trade-off between write performance and crash safety.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Sync to disk on transaction commit.
    ///
    /// This is the default and recommended setting. Provides good performance
    /// while ensuring committed data survives crashes.
    #[default]
    Normal,

    /// Async sync (faster writes, may lose recent data on crash).
    ///
    /// Use for development or when you can tolerate losing the last few
    /// seconds of writes. Significantly faster than `Normal`.
    Fast,

    /// Sync every write operation (slowest, maximum durability).
    ///
    /// Use when data loss is absolutely unacceptable. Very slow for
    /// high write volumes.
    Paranoid,
}

impl SyncMode {
    /// Returns true if this mode syncs on every write.
    pub fn is_paranoid(&self) -> bool {
        matches!(self, Self::Paranoid)
    }

    /// Returns true if this mode is async (may lose data on crash).
    pub fn is_fast(&self) -> bool {
        matches!(self, Self::Fast)
    }
}
