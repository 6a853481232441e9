//! ONNX-based embedding generation.
//!
//! This module provides embedding generation using ONNX Runtime.
//! It requires the `builtin-embeddings` feature to be enabled.
//!
//! # Supported Models
//!
//! - **all-MiniLM-L6-v2** (384 dimensions) - Default, fast and compact
//! - **bge-base-en-v1.5** (768 dimensions) - Higher quality, larger
//!
//! # Example
//!
//! ```rust,ignore
//! use relish::embedding::onnx::OnnxEmbedding;
//!
//! let service = OnnxEmbedding::new(None)?;  // Use default model
//! let embedding = service.embed("Hello, world!")?;
//! assert_eq!(embedding.len(), 384);
//! ```
//!
//! # Architecture
//!
//! The embedding pipeline mirrors what runs inside hosted embedding
//! endpoints, but executed locally:
//!
//! ```text
//! Text → Tokenize → ONNX Inference → Mean Pool → L2 Normalize → Embedding
//! ```
//!
//! # Performance Notes
//!
//! - Embedding generation is CPU-intensive
//! - Use `embed_batch()` for multiple texts (batched inference is cheaper)
//! - Consider using `spawn_blocking` when called from async context

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::embedding::EmbeddingService;
use crate::error::{RelishError, Result};
use crate::types::Embedding;

// ---------------------------------------------------------------------------
// Model catalog
// ---------------------------------------------------------------------------

/// File names expected in each model directory
const MODEL_FILENAME: &str = "model.onnx";
const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// Static description of a sentence-transformer model relish can fetch
/// and run out of the box.
struct ModelSpec {
    name: &'static str,
    dimension: usize,
    max_length: usize,
    model_url: &'static str,
    tokenizer_url: &'static str,
}

const SUPPORTED_MODELS: &[ModelSpec] = &[
    ModelSpec {
        name: "all-MiniLM-L6-v2",
        dimension: 384,
        max_length: 256,
        model_url: "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx",
        tokenizer_url: "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json",
    },
    ModelSpec {
        name: "bge-base-en-v1.5",
        dimension: 768,
        max_length: 512,
        model_url: "https://huggingface.co/BAAI/bge-base-en-v1.5/resolve/main/onnx/model.onnx",
        tokenizer_url: "https://huggingface.co/BAAI/bge-base-en-v1.5/resolve/main/tokenizer.json",
    },
];

/// Looks up the bundled model spec for a dimension, if any.
fn model_for_dimension(dimension: usize) -> Option<&'static ModelSpec> {
    SUPPORTED_MODELS.iter().find(|m| m.dimension == dimension)
}

// ---------------------------------------------------------------------------
// OnnxEmbedding struct
// ---------------------------------------------------------------------------

/// ONNX-based embedding service.
///
/// Generates embeddings locally using an ONNX model via ONNX Runtime.
/// The model and tokenizer are loaded eagerly at construction time for
/// fail-fast behavior: if the model files are missing, you'll get an
/// error at `Relish::open()`, not at the first `add_document()`.
///
/// # Thread Safety
///
/// `OnnxEmbedding` is `Send + Sync`. The session is wrapped in a Mutex
/// because `Session::run()` requires `&mut self`, while our
/// [`EmbeddingService`] trait uses `&self` for concurrent access.
pub struct OnnxEmbedding {
    /// ONNX Runtime session (the loaded model, ready for inference).
    session: Mutex<Session>,

    /// HuggingFace tokenizer (converts text to token IDs).
    /// Immutable after loading so no Mutex needed.
    tokenizer: Tokenizer,

    /// Embedding dimension produced by this model (e.g., 384 or 768).
    dimension: usize,

    /// Maximum sequence length the model accepts.
    max_length: usize,
}

impl OnnxEmbedding {
    /// Creates a new ONNX embedding service with the default model
    /// (all-MiniLM-L6-v2, 384d).
    ///
    /// # Arguments
    ///
    /// * `model_path` - Optional path to a model directory containing
    ///   `model.onnx` and `tokenizer.json`. If `None`, looks in the default
    ///   cache directory (`~/.cache/relish/models/all-MiniLM-L6-v2/`).
    ///
    /// # Errors
    ///
    /// Returns an error if model files are not found or cannot be loaded.
    pub fn new(model_path: Option<PathBuf>) -> Result<Self> {
        Self::with_dimension(model_path, 384)
    }

    /// Creates an ONNX embedding service with a specific dimension.
    ///
    /// The dimension determines which bundled model to use:
    /// - `384` → all-MiniLM-L6-v2 (max 256 tokens)
    /// - `768` → bge-base-en-v1.5 (max 512 tokens)
    /// - Other → requires `model_path` to be provided
    ///
    /// # Arguments
    ///
    /// * `model_path` - Optional path to a model directory
    /// * `dimension` - Expected embedding dimension
    pub fn with_dimension(model_path: Option<PathBuf>, dimension: usize) -> Result<Self> {
        let max_length = model_for_dimension(dimension).map_or(256, |spec| spec.max_length);

        let model_dir = resolve_model_dir(model_path.as_deref(), dimension)?;

        info!(
            model_dir = %model_dir.display(),
            dimension,
            max_length,
            "Loading ONNX embedding model"
        );

        Self::load_from_dir(&model_dir, dimension, max_length)
    }

    /// Downloads the default model files to the cache directory.
    ///
    /// Downloads `model.onnx` and `tokenizer.json` from HuggingFace Hub
    /// to `~/.cache/relish/models/{model_name}/`. Files already present
    /// are not downloaded again.
    ///
    /// # Arguments
    ///
    /// * `dimension` - Which model to download:
    ///   - `384` → all-MiniLM-L6-v2
    ///   - `768` → bge-base-en-v1.5
    ///
    /// # Returns
    ///
    /// The path to the model directory.
    pub fn download_default_model(dimension: usize) -> Result<PathBuf> {
        let spec = model_for_dimension(dimension).ok_or_else(|| {
            RelishError::embedding(format!(
                "No default model for dimension {dimension}. \
                 Supported: 384 (all-MiniLM-L6-v2), 768 (bge-base-en-v1.5)"
            ))
        })?;

        let cache_dir = default_cache_dir(spec.name);

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            RelishError::embedding(format!(
                "Failed to create model cache directory {}: {e}",
                cache_dir.display()
            ))
        })?;

        let model_path = cache_dir.join(MODEL_FILENAME);
        let tokenizer_path = cache_dir.join(TOKENIZER_FILENAME);

        if !model_path.exists() {
            info!(url = spec.model_url, dest = %model_path.display(), "Downloading ONNX model");
            download_file(spec.model_url, &model_path)?;
        }

        if !tokenizer_path.exists() {
            info!(url = spec.tokenizer_url, dest = %tokenizer_path.display(), "Downloading tokenizer");
            download_file(spec.tokenizer_url, &tokenizer_path)?;
        }

        info!(dir = %cache_dir.display(), "Model files ready");
        Ok(cache_dir)
    }

    /// Loads the model and tokenizer from a directory.
    fn load_from_dir(model_dir: &Path, dimension: usize, max_length: usize) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILENAME);
        let tokenizer_path = model_dir.join(TOKENIZER_FILENAME);

        if !model_path.exists() {
            return Err(RelishError::embedding(format!(
                "Model file not found: {}. \
                 Download with OnnxEmbedding::download_default_model({dimension}) \
                 or provide a directory containing '{MODEL_FILENAME}'",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(RelishError::embedding(format!(
                "Tokenizer file not found: {}. \
                 The model directory must contain '{TOKENIZER_FILENAME}'",
                tokenizer_path.display()
            )));
        }

        let session = create_session(&model_path)?;
        let tokenizer = load_tokenizer(&tokenizer_path, max_length)?;

        debug!(dimension, max_length, "ONNX embedding model loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension,
            max_length,
        })
    }

    /// Runs the model over a padded `[batch_size, seq_len]` input and
    /// returns the flat token embeddings `[batch_size * seq_len * dim]`.
    fn run_inference(
        &self,
        batch_size: usize,
        seq_len: usize,
        input_ids: Vec<i64>,
        attention_mask: &[i64],
    ) -> Result<Vec<f32>> {
        let token_type_ids = vec![0i64; batch_size * seq_len];

        let ids_array = Array2::from_shape_vec((batch_size, seq_len), input_ids)
            .map_err(|e| RelishError::embedding(format!("Tensor shape error: {e}")))?;
        let mask_array = Array2::from_shape_vec((batch_size, seq_len), attention_mask.to_vec())
            .map_err(|e| RelishError::embedding(format!("Tensor shape error: {e}")))?;
        let type_array = Array2::from_shape_vec((batch_size, seq_len), token_type_ids)
            .map_err(|e| RelishError::embedding(format!("Tensor shape error: {e}")))?;

        let ids_tensor = ort::value::Tensor::from_array(ids_array)
            .map_err(|e| RelishError::embedding(format!("Tensor creation failed: {e}")))?;
        let mask_tensor = ort::value::Tensor::from_array(mask_array)
            .map_err(|e| RelishError::embedding(format!("Tensor creation failed: {e}")))?;
        let type_tensor = ort::value::Tensor::from_array(type_array)
            .map_err(|e| RelishError::embedding(format!("Tensor creation failed: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| RelishError::embedding(format!("Session lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])
            .map_err(|e| RelishError::embedding(format!("ONNX inference failed: {e}")))?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RelishError::embedding(format!("Output extraction failed: {e}")))?;

        Ok(data.to_vec())
    }
}

impl EmbeddingService for OnnxEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut batch = self.embed_batch(&[text])?;
        batch
            .pop()
            .ok_or_else(|| RelishError::embedding("Inference produced no embedding"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(RelishError::embedding(format!(
                "Cannot embed empty text (batch position {pos})"
            )));
        }

        // 1. Tokenize all texts (with special tokens)
        let encodings: Vec<_> = texts
            .iter()
            .map(|t| self.tokenizer.encode(*t, true))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RelishError::embedding(format!("Tokenization failed: {e}")))?;

        // 2. Pad to the longest sequence in the batch rather than the
        //    model maximum; shorter batches cost less inference time.
        let seq_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len().min(self.max_length))
            .max()
            .unwrap_or(0);
        let batch_size = texts.len();

        // 3. Build padded [batch_size, seq_len] inputs
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(self.max_length);
            for col in 0..len {
                input_ids[row * seq_len + col] = ids[col] as i64;
                attention_mask[row * seq_len + col] = mask[col] as i64;
            }
        }

        // 4. One inference pass for the whole batch
        let data = self.run_inference(batch_size, seq_len, input_ids, &attention_mask)?;

        // 5. Per-text mean pooling + L2 normalization
        let row_len = seq_len * self.dimension;
        let mut results = Vec::with_capacity(batch_size);
        for row in 0..batch_size {
            let token_data = &data[row * row_len..(row + 1) * row_len];
            let row_mask = &attention_mask[row * seq_len..(row + 1) * seq_len];
            let pooled = mean_pool(token_data, row_mask, self.dimension);
            results.push(l2_normalize(pooled));
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Creates an ONNX Runtime session with optimized settings.
fn create_session(model_path: &Path) -> Result<Session> {
    Session::builder()
        .map_err(|e| RelishError::embedding(format!("Failed to create session builder: {e}")))?
        // Level3: all optimizations (operator fusion, constant folding, etc.)
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| RelishError::embedding(format!("Failed to set optimization level: {e}")))?
        .commit_from_file(model_path)
        .map_err(|e| {
            RelishError::embedding(format!(
                "Failed to load ONNX model from {}: {e}",
                model_path.display()
            ))
        })
}

/// Loads a HuggingFace tokenizer from a tokenizer.json file.
fn load_tokenizer(tokenizer_path: &Path, max_length: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
        RelishError::embedding(format!(
            "Failed to load tokenizer from {}: {e}",
            tokenizer_path.display()
        ))
    })?;

    // Configure truncation to model's max sequence length
    tokenizer
        .with_truncation(Some(tokenizers::TruncationParams {
            max_length,
            strategy: tokenizers::TruncationStrategy::LongestFirst,
            ..Default::default()
        }))
        .map_err(|e| RelishError::embedding(format!("Failed to set truncation: {e}")))?;

    // Disable tokenizer-side padding; embed_batch pads to the longest
    // sequence in the batch instead of max_length
    tokenizer.with_padding(None);

    Ok(tokenizer)
}

/// Resolves the model directory from an optional user path or default cache.
fn resolve_model_dir(model_path: Option<&Path>, dimension: usize) -> Result<PathBuf> {
    match model_path {
        Some(path) => {
            if !path.exists() {
                return Err(RelishError::embedding(format!(
                    "Model directory not found: {}",
                    path.display()
                )));
            }
            Ok(path.to_path_buf())
        }
        None => {
            let spec = model_for_dimension(dimension).ok_or_else(|| {
                RelishError::embedding(format!(
                    "No default model for dimension {dimension}. \
                     Provide a model_path for custom dimensions, \
                     or use 384 (all-MiniLM-L6-v2) or 768 (bge-base-en-v1.5)"
                ))
            })?;

            let cache_dir = default_cache_dir(spec.name);

            if !cache_dir.join(MODEL_FILENAME).exists() {
                return Err(RelishError::embedding(format!(
                    "Model not found at {}. \
                     Download with: OnnxEmbedding::download_default_model({dimension})",
                    cache_dir.display()
                )));
            }

            Ok(cache_dir)
        }
    }
}

/// Returns the default cache directory for a model.
///
/// Platform-specific:
/// - Linux: `~/.cache/relish/models/{name}/`
/// - macOS: `~/Library/Caches/relish/models/{name}/`
/// - Windows: `{LOCALAPPDATA}/relish/models/{name}/`
fn default_cache_dir(model_name: &str) -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("relish")
        .join("models")
        .join(model_name)
}

/// Mean pooling over one text's token embeddings.
///
/// Averages the embeddings of real tokens (mask != 0) into a single
/// sentence embedding. Padding tokens contribute nothing.
///
/// `token_embeddings` is laid out row-major as `[seq_len, dim]`: each
/// contiguous block of `dim` floats is one token's embedding.
fn mean_pool(token_embeddings: &[f32], attention_mask: &[i64], dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let mut real_tokens = 0.0f32;

    for (token, &mask) in token_embeddings.chunks_exact(dim).zip(attention_mask) {
        if mask == 0 {
            continue;
        }
        real_tokens += 1.0;
        for (acc, value) in pooled.iter_mut().zip(token) {
            *acc += value;
        }
    }

    // Avoid division by zero when every token is masked
    if real_tokens > 0.0 {
        for value in &mut pooled {
            *value /= real_tokens;
        }
    }

    pooled
}

/// L2 normalizes a vector to unit length.
///
/// After normalization, cosine similarity reduces to a dot product:
/// `cos(a, b) = a · b` when `|a| = |b| = 1`.
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut v {
            *value /= norm;
        }
    }
    v
}

/// Downloads a file from a URL to a local path.
fn download_file(url: &str, dest: &Path) -> Result<()> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| RelishError::embedding(format!("Download failed for {url}: {e}")))?;

    let mut reader = response.into_body().into_reader();
    let mut file = std::fs::File::create(dest).map_err(|e| {
        RelishError::embedding(format!("Failed to create file {}: {e}", dest.display()))
    })?;

    std::io::copy(&mut reader, &mut file).map_err(|e| {
        RelishError::embedding(format!("Failed to write to {}: {e}", dest.display()))
    })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
