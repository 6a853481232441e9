//! CSV ingestion pipeline.
//!
//! [`Relish::ingest_csv`] loads a review corpus from a CSV file and
//! rebuilds a collection from it:
//!
//! 1. Parse the CSV and pick the configured text column
//! 2. Trim each row's text; drop rows that are missing or blank
//! 3. Optionally split long texts into overlapping chunks
//! 4. Replace the target collection (deleting any existing one)
//! 5. Embed and store the documents in batches
//!
//! Each stored document carries a `review_idx` metadata entry: the
//! 0-based position of its source row among the kept rows, so chunks of
//! the same review share one index.
//!
//! Ingestion needs a working embedding service. With the stock External
//! provider there is nothing to generate vectors with and the first
//! batch fails; use the builtin provider or a caller-supplied service
//! ([`Relish::open_with_embedding`]).

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::config::ChunkConfig;
use crate::db::Relish;
use crate::document::{Document, MetadataValue};
use crate::error::{RelishError, Result, ValidationError};
use crate::storage::schema::MAX_TEXT_SIZE;
use crate::types::{CollectionId, DocumentId, Timestamp};

// ==========================================================================
// Types
// ==========================================================================

/// Per-call overrides for [`Relish::ingest_csv`].
///
/// Fields left `None` fall back to the configured defaults
/// (`default_collection`, `text_column`, and `chunking`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IngestOptions {
    /// Name of the collection to (re)build.
    pub collection: Option<String>,

    /// CSV column holding the review text.
    pub text_column: Option<String>,

    /// Chunking override. `None` uses the configured chunking, which
    /// defaults to off.
    pub chunking: Option<ChunkConfig>,
}

/// Summary of one ingestion run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestReport {
    /// ID of the freshly created collection.
    pub collection_id: CollectionId,

    /// Data rows seen in the CSV (header excluded).
    pub rows_read: usize,

    /// Rows dropped for a missing or blank text field.
    pub rows_skipped: usize,

    /// Documents stored. Greater than `rows_read - rows_skipped` when
    /// chunking splits rows.
    pub documents_written: usize,
}

// ==========================================================================
// Chunking
// ==========================================================================

/// Splits `text` into chunks of at most `size` characters, consecutive
/// chunks overlapping by `overlap` characters.
///
/// Boundaries count characters, not bytes, so multi-byte text never
/// splits mid-character. Chunks that contain only whitespace are
/// dropped. Callers must ensure `overlap < size`.
pub(crate) fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        start += step;
    }
    chunks
}

// ==========================================================================
// Ingestion
// ==========================================================================

impl Relish {
    /// Rebuilds a collection from a CSV file of reviews.
    ///
    /// The target collection is deleted (if present) and recreated, so
    /// re-running ingestion replaces the corpus rather than appending
    /// to it. Rows are embedded and stored in batches of
    /// `config.ingest_batch_size`.
    ///
    /// # Errors
    ///
    /// - `Ingest` if the file cannot be read, a record is malformed, or
    ///   the text column is missing from the header
    /// - `Validation` if a chunking override is inconsistent or a row's
    ///   text exceeds the stored-text size limit
    /// - `Embedding` if vector generation fails (always the case with
    ///   the stock External provider)
    /// - `Storage` / `Vector` on persistence or index failure
    ///
    /// The CSV is parsed and validated before the existing collection
    /// is touched. A failure during embedding or storage leaves the
    /// recreated collection partially filled.
    #[instrument(skip(self, path, options), fields(path = %path.as_ref().display()))]
    pub fn ingest_csv(&self, path: impl AsRef<Path>, options: IngestOptions) -> Result<IngestReport> {
        let path = path.as_ref();
        let collection_name = options
            .collection
            .unwrap_or_else(|| self.config().default_collection.clone());
        let text_column = options
            .text_column
            .unwrap_or_else(|| self.config().text_column.clone());
        let chunking = options.chunking.or(self.config().chunking);
        if let Some(chunk) = &chunking {
            chunk.validate()?;
        }

        // Parse the whole file up front; the existing collection stays
        // untouched if the CSV is unreadable.
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| RelishError::ingest(format!("cannot read CSV at {}: {e}", path.display())))?;

        let headers = reader
            .headers()
            .map_err(|e| RelishError::ingest(format!("cannot read CSV header: {e}")))?;
        let column_index = headers
            .iter()
            .position(|header| header == text_column)
            .ok_or_else(|| {
                RelishError::ingest(format!("column '{text_column}' not found in CSV header"))
            })?;

        let mut rows_read = 0;
        let mut rows_skipped = 0;
        let mut kept: Vec<String> = Vec::new();
        for record in reader.records() {
            let record = record
                .map_err(|e| RelishError::ingest(format!("malformed CSV record: {e}")))?;
            rows_read += 1;

            let text = record.get(column_index).map(str::trim).unwrap_or("");
            if text.is_empty() {
                rows_skipped += 1;
                continue;
            }
            kept.push(text.to_string());
        }

        // review_idx counts kept rows; chunks inherit their row's index.
        let pending: Vec<(usize, String)> = match &chunking {
            Some(chunk) => kept
                .iter()
                .enumerate()
                .flat_map(|(idx, text)| {
                    chunk_text(text, chunk.size, chunk.overlap)
                        .into_iter()
                        .map(move |piece| (idx, piece))
                })
                .collect(),
            None => kept.into_iter().enumerate().collect(),
        };

        for (_, text) in &pending {
            if text.len() > MAX_TEXT_SIZE {
                return Err(ValidationError::content_too_large(text.len(), MAX_TEXT_SIZE).into());
            }
        }

        // Replace the collection only after the CSV checks out.
        if let Some(existing) = self.find_collection(&collection_name)? {
            self.delete_collection(existing.id)?;
            debug!(collection_id = %existing.id, "Deleted existing collection");
        }
        let description = match path.file_name() {
            Some(name) => format!("Ingested from {}", name.to_string_lossy()),
            None => format!("Ingested from {}", path.display()),
        };
        let collection_id =
            self.create_collection_with_description(&collection_name, &description)?;

        let index = self.index_for(collection_id).ok_or_else(|| {
            RelishError::vector(format!(
                "no index registered for collection '{collection_name}'"
            ))
        })?;

        let documents_written = pending.len();
        for (batch_number, batch) in pending.chunks(self.config().ingest_batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|(_, text)| text.as_str()).collect();
            let embeddings = self.embedding().embed_batch(&texts)?;

            let documents: Vec<Document> = batch
                .iter()
                .zip(embeddings)
                .map(|((review_idx, text), embedding)| {
                    let mut metadata = std::collections::HashMap::new();
                    metadata.insert(
                        "review_idx".to_string(),
                        MetadataValue::Integer(*review_idx as i64),
                    );
                    Document {
                        id: DocumentId::new(),
                        collection_id,
                        text: text.clone(),
                        metadata,
                        embedding,
                        created_at: Timestamp::now(),
                    }
                })
                .collect();

            self.storage().save_documents(&documents)?;
            for document in &documents {
                index.insert_document(document.id, &document.embedding)?;
            }
            debug!(batch = batch_number, size = documents.len(), "Stored ingest batch");
        }

        info!(
            collection = %collection_name,
            collection_id = %collection_id,
            rows_read,
            rows_skipped,
            documents_written,
            "Ingestion completed"
        );
        Ok(IngestReport {
            collection_id,
            rows_read,
            rows_skipped,
            documents_written,
        })
    }
}

// ==========================================================================
// Tests
// ==========================================================================
