//! Core data types and error definitions for the sync pipeline.

use crate::{
    cms::CmsError, embedding::EmbeddingError, mirror::MirrorError, pinecone::IndexError,
};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors emitted by the indexing and webhook-sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// CMS interaction failed.
    #[error("CMS request failed: {0}")]
    Cms(#[from] CmsError),
    /// Embedding provider failed to produce vectors.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Vector index interaction failed.
    #[error("Index request failed: {0}")]
    Index(#[from] IndexError),
    /// Local mirror persistence failed.
    #[error("Mirror write failed: {0}")]
    Mirror(#[from] MirrorError),
    /// Webhook payload carried no resolvable entry uid.
    #[error("Missing entry uid")]
    MissingEntryId,
}

/// Errors emitted while serving similarity searches.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Query text was missing or empty.
    #[error("Query is required")]
    EmptyQuery,
    /// Embedding provider failed to embed the query.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Vector index query failed.
    #[error("Index request failed: {0}")]
    Index(#[from] IndexError),
}

/// Summary of a completed full reindex.
#[derive(Debug, Clone, Copy)]
pub struct ReindexOutcome {
    /// Total records written across all content types.
    pub indexed: usize,
}

/// Terminal result of processing one webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Entry state was embedded and written to the index and mirror.
    Upserted {
        /// Composite id of the written record.
        id: String,
    },
    /// Record was removed from the index and mirror.
    Deleted {
        /// Composite id of the removed record.
        id: String,
    },
    /// Event was acknowledged without any index mutation.
    Ignored {
        /// Why the event produced no mutation.
        reason: String,
    },
}

/// Ranked search result returned to API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Identifier of the matched record.
    pub id: String,
    /// Similarity score reported by the index.
    pub score: f32,
    /// Metadata stored with the record.
    pub metadata: Option<Map<String, Value>>,
}
