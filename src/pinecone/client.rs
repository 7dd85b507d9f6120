//! HTTP client wrapper for the managed vector index.

use crate::config::Config;
use crate::pinecone::types::{IndexError, QueryResponse, ScoredMatch, VectorRecord};
use reqwest::{Client, Method};
use serde_json::{Value, json};

/// Lightweight HTTP client for the index's data-plane operations.
///
/// The index is an external capability with `id`-keyed last-write-wins
/// semantics; this client holds no state beyond the connection settings.
pub struct IndexService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) namespace: Option<String>,
}

impl IndexService {
    /// Construct a new client using configuration derived from the environment.
    pub fn from_config(config: &Config) -> Result<Self, IndexError> {
        Self::new(
            &config.index_host,
            config.index_api_key.clone(),
            config.index_namespace.clone(),
        )
    }

    /// Construct a new client against an explicit host.
    pub fn new(
        host: &str,
        api_key: String,
        namespace: Option<String>,
    ) -> Result<Self, IndexError> {
        let client = Client::builder()
            .user_agent("semsync/0.1")
            .build()
            .map_err(IndexError::Http)?;
        let base_url = normalize_base_url(host).map_err(IndexError::InvalidUrl)?;
        tracing::debug!(url = %base_url, namespace = ?namespace, "Initialized index HTTP client");

        Ok(Self {
            client,
            base_url,
            api_key,
            namespace,
        })
    }

    /// Upload or overwrite records, keyed by their composite ids.
    pub async fn upsert(&self, records: &[VectorRecord]) -> Result<(), IndexError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut body = json!({ "vectors": records });
        self.apply_namespace(&mut body);

        let record_count = records.len();
        let response = self
            .request(Method::POST, "vectors/upsert")
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(records = record_count, "Records upserted");
        })
        .await
    }

    /// Delete records by id; absent ids are not an error.
    pub async fn delete(&self, ids: &[String]) -> Result<(), IndexError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut body = json!({ "ids": ids });
        self.apply_namespace(&mut body);

        let id_count = ids.len();
        let response = self
            .request(Method::POST, "vectors/delete")
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(ids = id_count, "Records deleted");
        })
        .await
    }

    /// Query the nearest neighbors of a vector, optionally with stored metadata.
    pub async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<ScoredMatch>, IndexError> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": include_metadata,
        });
        self.apply_namespace(&mut body);

        let response = self.request(Method::POST, "query").json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IndexError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Index query failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        Ok(payload.matches)
    }

    /// Fetch the index's statistics document, scoped to the namespace when set.
    pub async fn describe_stats(&self) -> Result<Value, IndexError> {
        let response = self
            .request(Method::POST, "describe_index_stats")
            .json(&json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IndexError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Index stats request failed");
            return Err(error);
        }

        Ok(response.json().await?)
    }

    fn apply_namespace(&self, body: &mut Value) {
        if let Some(namespace) = self.namespace.as_deref().filter(|ns| !ns.is_empty())
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("namespace".into(), Value::String(namespace.to_string()));
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), IndexError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IndexError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Index request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
