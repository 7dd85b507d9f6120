//! Shared types used by the vector index client.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Host URL failed to parse or normalize.
    #[error("Invalid index host URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Index responded with an unexpected status code.
    #[error("Unexpected index response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the index.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Unit persisted to the vector index.
///
/// The `id` is the composite `"{content_type}_{uid}"` key, `values` has
/// exactly the configured index dimension (reconciled upstream by the
/// embedding gateway), and `metadata` is restricted to the primitive kinds
/// the index accepts.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    /// Composite record identifier.
    pub id: String,
    /// Embedding vector.
    pub values: Vec<f32>,
    /// Flat, index-safe metadata.
    pub metadata: Map<String, Value>,
}

/// Scored match returned by index queries.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredMatch {
    /// Identifier of the matched record.
    pub id: String,
    /// Similarity score computed by the index.
    #[serde(default)]
    pub score: f32,
    /// Metadata stored with the record, when requested.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub(crate) matches: Vec<ScoredMatch>,
}
