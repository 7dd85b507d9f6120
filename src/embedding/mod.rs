//! Embedding client abstraction and provider adapters.
//!
//! A single [`EmbeddingClient`] contract fronts the configured backend: a
//! self-hosted HTTP server, the hosted OpenAI or Gemini APIs, or a
//! deterministic in-process mock. The backend is selected once, when the
//! gateway is constructed from configuration, not re-branched per call site.
//! Whatever the backend natively produces is reconciled to the configured
//! index dimension before any caller sees it.

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Errors raised by embedding backends.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider selected without its credential being configured.
    #[error("Missing environment variable: {0}")]
    MissingCredential(&'static str),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend answered with a non-success status.
    #[error("Embedding backend error ({status}): {body}")]
    Backend {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Backend answered successfully but the response carried no usable vector.
    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),
    /// Backend vector length cannot be reduced to the configured dimension.
    #[error("Embedding dimension mismatch: backend returned {actual}, cannot reduce to {expected}")]
    DimensionMismatch {
        /// Dimension the index is configured for.
        expected: usize,
        /// Length of the vector the backend produced.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for a single piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed many texts, preserving input order in the output.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Connection settings resolved once from configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    /// Selected backend.
    pub provider: EmbeddingProvider,
    /// Dimension every returned vector must have.
    pub dimension: usize,
    /// Number of concurrent requests issued per batch.
    pub batch_size: usize,
    /// Endpoint of the local embedding server.
    pub local_url: String,
    /// Credential for the OpenAI API.
    pub openai_api_key: Option<String>,
    /// Model identifier passed to OpenAI.
    pub openai_model: String,
    /// Base URL for the OpenAI API.
    pub openai_base_url: String,
    /// Credential for the Gemini API.
    pub gemini_api_key: Option<String>,
    /// Model identifier passed to Gemini.
    pub gemini_model: String,
    /// Base URL for the Gemini API.
    pub gemini_base_url: String,
}

impl EmbeddingSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider: config.embedding_provider,
            dimension: config.embedding_dimension,
            batch_size: config.embed_batch_size,
            local_url: config.embedding_local_url.clone(),
            openai_api_key: config.openai_api_key.clone(),
            openai_model: config.openai_embedding_model.clone(),
            openai_base_url: config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            gemini_api_key: config.gemini_api_key.clone(),
            gemini_model: config.gemini_embedding_model.clone(),
            gemini_base_url: config
                .gemini_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
        }
    }
}

/// Gateway dispatching to the configured embedding backend.
pub struct EmbeddingGateway {
    client: Client,
    settings: EmbeddingSettings,
}

impl EmbeddingGateway {
    /// Construct a gateway for the given settings.
    pub fn new(settings: EmbeddingSettings) -> Result<Self, EmbeddingError> {
        let client = Client::builder().user_agent("semsync/0.1").build()?;
        Ok(Self { client, settings })
    }

    async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self.settings.provider {
            EmbeddingProvider::Local => self.embed_local(text).await,
            EmbeddingProvider::OpenAI => self.embed_openai(text).await,
            EmbeddingProvider::Gemini => self.embed_gemini(text).await,
            EmbeddingProvider::Mock => Ok(mock_embedding(text, self.settings.dimension)),
        }
    }

    async fn embed_local(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(&self.settings.local_url)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let payload: LocalEmbedResponse = response.json().await?;
        Ok(payload.embedding)
    }

    async fn embed_openai(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let api_key = self
            .settings
            .openai_api_key
            .as_deref()
            .ok_or(EmbeddingError::MissingCredential("OPENAI_API_KEY"))?;
        let url = format!(
            "{}/v1/embeddings",
            self.settings.openai_base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&json!({ "model": self.settings.openai_model, "input": text }))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let payload: OpenAiEmbedResponse = response.json().await?;
        payload
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| EmbeddingError::MalformedResponse("empty data array".to_string()))
    }

    async fn embed_gemini(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let api_key = self
            .settings
            .gemini_api_key
            .as_deref()
            .ok_or(EmbeddingError::MissingCredential("GEMINI_API_KEY"))?;
        let url = format!(
            "{}/v1beta/models/{}:embedContent",
            self.settings.gemini_base_url.trim_end_matches('/'),
            self.settings.gemini_model
        );
        let response = self
            .client
            .post(url)
            .query(&[("key", api_key)])
            .json(&json!({ "content": { "parts": [{ "text": text }] } }))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let payload: GeminiEmbedResponse = response.json().await?;
        let values = payload
            .embedding
            .ok_or_else(|| EmbeddingError::MalformedResponse("missing embedding values".into()))?
            .values;
        Ok(values)
    }
}

#[async_trait]
impl EmbeddingClient for EmbeddingGateway {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let raw = self.embed_raw(text).await?;
        reconcile_dimension(raw, self.settings.dimension)
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let batch_size = self.settings.batch_size.max(1);
        tracing::debug!(
            provider = ?self.settings.provider,
            texts = texts.len(),
            batch_size,
            "Generating embeddings"
        );
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let embeddings = try_join_all(batch.iter().map(|text| self.embed(text))).await?;
            vectors.extend(embeddings);
        }
        Ok(vectors)
    }
}

/// Build an embedding client for the current configuration.
pub fn get_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient + Send + Sync>, EmbeddingError> {
    let gateway = EmbeddingGateway::new(EmbeddingSettings::from_config(config))?;
    Ok(Box::new(gateway))
}

/// Deterministic hash-seeded embedding used by the mock provider.
///
/// Identical input text always yields an identical vector of `dimension`
/// components, so the rest of the pipeline is testable without network access.
pub fn mock_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let seed = text.chars().map(|c| c as u64).sum::<u64>() as f32;
    (0..dimension)
        .map(|i| (seed * 1e-4 + i as f32 * 0.01).sin())
        .collect()
}

/// Reduce a backend vector to the target dimension.
///
/// A vector of exactly the target length passes through. A vector whose
/// length is an integer multiple of the target is mean-pooled block-wise:
/// each output component is the average of `len / target` contiguous inputs.
/// Any other length is a configuration error and fails loudly rather than
/// silently truncating.
pub fn reconcile_dimension(values: Vec<f32>, target: usize) -> Result<Vec<f32>, EmbeddingError> {
    if values.len() == target {
        return Ok(values);
    }
    if target == 0 || values.is_empty() || values.len() % target != 0 {
        return Err(EmbeddingError::DimensionMismatch {
            expected: target,
            actual: values.len(),
        });
    }

    let factor = values.len() / target;
    let pooled = values
        .chunks_exact(factor)
        .map(|block| block.iter().sum::<f32>() / factor as f32)
        .collect();
    Ok(pooled)
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EmbeddingError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(EmbeddingError::Backend { status, body })
    }
}

#[derive(Deserialize)]
struct LocalEmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct GeminiEmbedResponse {
    #[serde(default)]
    embedding: Option<GeminiEmbeddingValues>,
}

#[derive(Deserialize)]
struct GeminiEmbeddingValues {
    values: Vec<f32>,
}
