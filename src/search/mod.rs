//! Scored semantic search.
//!
//! Searching embeds the query text, asks the collection's HNSW index for
//! the nearest neighbours, joins each neighbour ID back to its stored
//! record, and converts cosine distances to similarity scores:
//!
//! ```text
//! similarity = 1 / (1 + distance)
//! ```
//!
//! Results whose similarity falls below the threshold are dropped; the
//! survivors keep the index's ascending-distance order. Similarity and
//! distance are rounded to four decimals for display, but the threshold
//! comparison always uses the unrounded similarity.
//!
//! # Errors
//!
//! The search path reports exactly two kinds of failure:
//!
//! - [`RelishError::InvalidQuery`] for bad input (blank query,
//!   out-of-range `top_k`), returned before any storage or model work
//!   happens
//! - [`RelishError::Retrieval`] wrapping everything that goes wrong after
//!   validation: unknown collection, embedding failure, index or storage
//!   errors, a neighbour ID with no stored record

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::db::Relish;
use crate::document::MetadataValue;
use crate::error::{NotFoundError, RelishError, Result};
use crate::types::DocumentId;

/// Upper bound on per-call `top_k`, same as the cap on
/// `Config::default_top_k`.
const MAX_TOP_K: usize = 1000;

// ==========================================================================
// Types
// ==========================================================================

/// Per-call overrides for [`Relish::search`].
///
/// Fields left `None` fall back to the configured defaults
/// (`default_top_k` and `similarity_threshold`).
///
/// # Example
///
/// ```rust,ignore
/// use relish::SearchOptions;
///
/// let options = SearchOptions {
///     top_k: Some(10),
///     threshold: Some(0.25),
/// };
/// let results = db.search("late night ramen", options)?;
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SearchOptions {
    /// Maximum number of neighbours to retrieve. Must be in `1..=1000`;
    /// values outside that range are rejected as an invalid query.
    pub top_k: Option<usize>,

    /// Minimum similarity a result must reach to be returned.
    pub threshold: Option<f32>,
}

/// One search result: a stored document plus its scores.
///
/// `similarity` and `distance` are rounded to four decimals; they are
/// display values. The unrounded similarity was already compared against
/// the threshold before this struct was built.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredResult {
    /// The matched document.
    pub document_id: DocumentId,

    /// The document's text.
    pub text: String,

    /// The document's metadata entries.
    pub metadata: HashMap<String, MetadataValue>,

    /// Similarity in `(0, 1]`, higher is closer. Rounded to 4 decimals.
    pub similarity: f32,

    /// Cosine distance in `[0, 2]`, lower is closer. Rounded to 4 decimals.
    pub distance: f32,
}

/// A nearest neighbour joined with its stored record.
///
/// Built during hydration: every ID the index returns must resolve to a
/// stored document, otherwise the whole search fails. This keeps a
/// desynced index from silently shrinking result sets.
#[derive(Clone, Debug)]
struct NeighborRecord {
    id: DocumentId,
    text: String,
    metadata: HashMap<String, MetadataValue>,
    distance: f32,
}

// ==========================================================================
// Scoring
// ==========================================================================

/// Converts a cosine distance into a similarity score.
///
/// Strictly decreasing in distance. Distance 0 (identical vectors) maps
/// to 1.0; distance 1 (orthogonal) maps to 0.5; similarity approaches
/// 1/3 as distance approaches the cosine maximum of 2.
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Rounds a score to four decimal places for display.
///
/// Ties round away from zero.
fn round_to_display(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}

/// Applies scoring and threshold filtering to hydrated neighbours.
///
/// Input order (ascending distance, as returned by the index) is
/// preserved. The threshold compares against the unrounded similarity;
/// only the values stored in [`ScoredResult`] are rounded.
fn score_neighbors(records: Vec<NeighborRecord>, threshold: f32) -> Vec<ScoredResult> {
    records
        .into_iter()
        .filter_map(|record| {
            let similarity = similarity_from_distance(record.distance);
            if !(similarity >= threshold) {
                return None;
            }
            Some(ScoredResult {
                document_id: record.id,
                text: record.text,
                metadata: record.metadata,
                similarity: round_to_display(similarity),
                distance: round_to_display(record.distance),
            })
        })
        .collect()
}

// ==========================================================================
// Search operations
// ==========================================================================

impl Relish {
    /// Searches the default collection for documents similar to `query`.
    ///
    /// Equivalent to [`Relish::search_collection`] with
    /// `config.default_collection` as the collection name.
    ///
    /// # Errors
    ///
    /// - [`RelishError::InvalidQuery`] if the trimmed query is empty or
    ///   `options.top_k` is outside `1..=1000`
    /// - [`RelishError::Retrieval`] for any failure after validation
    pub fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<ScoredResult>> {
        let collection = self.config().default_collection.clone();
        self.search_collection(&collection, query, options)
    }

    /// Searches a collection for documents similar to `query`.
    ///
    /// The query is trimmed, embedded, and matched against the
    /// collection's index. At most `top_k` results are returned, ordered
    /// by ascending distance, each scoring at least `threshold`
    /// similarity. An empty result set is a normal outcome, not an
    /// error.
    ///
    /// # Errors
    ///
    /// - [`RelishError::InvalidQuery`] if the trimmed query is empty or
    ///   `options.top_k` is outside `1..=1000`; no embedding or storage
    ///   work has happened when this is returned
    /// - [`RelishError::Retrieval`] for any failure after validation.
    ///   There are no partial results: a search either completes fully
    ///   or fails.
    #[instrument(skip(self, query, options), fields(collection = %collection, query_len = query.len()))]
    pub fn search_collection(
        &self,
        collection: &str,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<ScoredResult>> {
        // Input validation happens before anything external is touched.
        let query = query.trim();
        if query.is_empty() {
            return Err(RelishError::invalid_query("query text is empty"));
        }

        let top_k = options.top_k.unwrap_or(self.config().default_top_k);
        if top_k == 0 {
            return Err(RelishError::invalid_query("top_k must be greater than 0"));
        }
        if top_k > MAX_TOP_K {
            return Err(RelishError::invalid_query(format!(
                "top_k must not exceed {MAX_TOP_K}"
            )));
        }

        let threshold = options
            .threshold
            .unwrap_or(self.config().similarity_threshold);

        // Past validation, every failure folds into a Retrieval error.
        self.search_inner(collection, query, top_k, threshold)
            .map_err(RelishError::into_retrieval)
    }

    fn search_inner(
        &self,
        collection_name: &str,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredResult>> {
        let collection = self
            .storage()
            .find_collection_by_name(collection_name)?
            .ok_or_else(|| NotFoundError::collection(collection_name))?;

        let index = self.index_for(collection.id).ok_or_else(|| {
            RelishError::vector(format!(
                "no index registered for collection '{collection_name}'"
            ))
        })?;

        let embedding = self.embedding().embed(query)?;

        let neighbours =
            index.search_documents(&embedding, top_k, self.config().hnsw.ef_search)?;
        let requested = neighbours.len();

        let records = self.hydrate_neighbors(neighbours)?;
        let results = score_neighbors(records, threshold);

        debug!(
            collection_id = %collection.id,
            neighbours = requested,
            kept = results.len(),
            top_k,
            threshold,
            "Search completed"
        );

        Ok(results)
    }

    /// Joins neighbour IDs back to their stored records.
    ///
    /// An ID the index knows but storage doesn't is a hard error, never
    /// a silent skip.
    fn hydrate_neighbors(
        &self,
        neighbours: Vec<(DocumentId, f32)>,
    ) -> Result<Vec<NeighborRecord>> {
        let mut records = Vec::with_capacity(neighbours.len());
        for (id, distance) in neighbours {
            let document = self.storage().get_document(id)?.ok_or_else(|| {
                RelishError::retrieval(format!(
                    "index returned document {id} with no stored record"
                ))
            })?;
            records.push(NeighborRecord {
                id,
                text: document.text,
                metadata: document.metadata,
                distance,
            });
        }
        Ok(records)
    }
}

// ==========================================================================
// Tests
// ==========================================================================
