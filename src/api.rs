//! JSON payload types for the search surface.
//!
//! These are the shapes a web front end exchanges with the engine; no
//! HTTP server lives in this crate. A request carries the query plus
//! optional overrides, a response carries the scored hits:
//!
//! ```json
//! { "query": "good pizza", "results": [ ... ], "count": 2 }
//! ```
//!
//! Failures serialize as `{ "error": "..." }` and the liveness probe as
//! `{ "status": "ok" }`. Status codes are the transport's concern; the
//! error body carries nothing beyond the message.

use serde::{Deserialize, Serialize};

use crate::error::RelishError;
use crate::search::{ScoredResult, SearchOptions};

/// A search request as posted by a client.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SearchRequest {
    /// The query text. Required.
    pub query: String,

    /// Optional result count override.
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Optional similarity threshold override.
    #[serde(default)]
    pub threshold: Option<f32>,
}

impl SearchRequest {
    /// Converts the request's overrides into [`SearchOptions`].
    pub fn options(&self) -> SearchOptions {
        SearchOptions {
            top_k: self.top_k,
            threshold: self.threshold,
        }
    }
}

/// One scored result in wire form.
///
/// The similarity serializes under the key `score`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SearchHit {
    /// Document ID as a UUID string.
    pub id: String,

    /// The document's text.
    pub text: String,

    /// Similarity score, 4 decimals.
    #[serde(rename = "score")]
    pub similarity: f64,

    /// Cosine distance, 4 decimals.
    pub distance: f64,

    /// Document metadata as a JSON object.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Widening an already-rounded f32 to f64 reintroduces digits past the
/// fourth place; re-round in f64 so the wire shows the display value.
fn round4(value: f32) -> f64 {
    (f64::from(value) * 10_000.0).round() / 10_000.0
}

impl From<ScoredResult> for SearchHit {
    fn from(result: ScoredResult) -> Self {
        Self {
            id: result.document_id.to_string(),
            text: result.text,
            similarity: round4(result.similarity),
            distance: round4(result.distance),
            metadata: result
                .metadata
                .into_iter()
                .map(|(key, value)| (key, value.to_json()))
                .collect(),
        }
    }
}

/// A successful search response.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SearchResponse {
    /// The (trimmed) query that was executed.
    pub query: String,

    /// Scored hits, best first.
    pub results: Vec<SearchHit>,

    /// Number of hits; always `results.len()`.
    pub count: usize,
}

impl SearchResponse {
    /// Builds a response, deriving `count` from the hit list.
    pub fn new(query: impl Into<String>, results: Vec<SearchHit>) -> Self {
        let count = results.len();
        Self {
            query: query.into(),
            results,
            count,
        }
    }
}

/// A failed request, `{ "error": "..." }`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ErrorBody {
    /// Human-readable failure message.
    pub error: String,
}

impl From<&RelishError> for ErrorBody {
    fn from(err: &RelishError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Liveness probe body, `{ "status": "ok" }`.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// Always `"ok"` for a serving engine.
    pub status: &'static str,
}

impl HealthStatus {
    /// The healthy response.
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}
