//! Read-only client for the headless CMS.
//!
//! Three operations are consumed: content-type enumeration (management API),
//! paginated entry listing, and single published-entry fetch (delivery API).
//! Entries are schema-less; they surface as raw `serde_json::Value` objects
//! and all interpretation happens downstream.

use crate::config::Config;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors returned while talking to the CMS.
#[derive(Debug, Error)]
pub enum CmsError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid CMS URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// CMS responded with an unexpected status code.
    #[error("Unexpected CMS response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the CMS.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Content-type enumeration requires a management token.
    #[error("Missing environment variable: CMS_MANAGEMENT_TOKEN")]
    MissingManagementToken,
}

/// HTTP client for the CMS read APIs.
pub struct CmsClient {
    client: Client,
    base_url: String,
    api_key: String,
    delivery_token: String,
    management_token: Option<String>,
    environment: Option<String>,
}

impl CmsClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn from_config(config: &Config) -> Result<Self, CmsError> {
        let client = Client::builder()
            .user_agent("semsync/0.1")
            .build()
            .map_err(CmsError::Http)?;
        let base_url = normalize_base_url(&config.cms_base_url).map_err(CmsError::InvalidUrl)?;

        Ok(Self {
            client,
            base_url,
            api_key: config.cms_api_key.clone(),
            delivery_token: config.cms_delivery_token.clone(),
            management_token: config.cms_management_token.clone(),
            environment: config.cms_environment.clone(),
        })
    }

    /// Enumerate the uids of all content types defined in the stack.
    pub async fn list_content_types(&self) -> Result<Vec<String>, CmsError> {
        let management_token = self
            .management_token
            .as_deref()
            .ok_or(CmsError::MissingManagementToken)?;

        let response = self
            .request(Method::GET, "v3/content_types")
            .header("authorization", management_token)
            .send()
            .await?;
        let response = self.ensure_success(response).await?;

        let payload: ContentTypesResponse = response.json().await?;
        Ok(payload
            .content_types
            .into_iter()
            .map(|content_type| content_type.uid)
            .collect())
    }

    /// Fetch one page of published entries for a content type.
    ///
    /// Pagination is skip/limit based; a page shorter than `limit` is the
    /// last one.
    pub async fn fetch_entries(
        &self,
        content_type: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Value>, CmsError> {
        let mut request = self
            .request(
                Method::GET,
                &format!("v3/content_types/{content_type}/entries"),
            )
            .header("access_token", &self.delivery_token)
            .query(&[("skip", skip.to_string()), ("limit", limit.to_string())]);
        if let Some(environment) = &self.environment {
            request = request.query(&[("environment", environment)]);
        }

        let response = self.ensure_success(request.send().await?).await?;
        let payload: EntriesResponse = response.json().await?;
        Ok(payload.entries)
    }

    /// Fetch the current published state of a single entry.
    pub async fn fetch_entry(&self, content_type: &str, uid: &str) -> Result<Value, CmsError> {
        let mut request = self
            .request(
                Method::GET,
                &format!("v3/content_types/{content_type}/entries/{uid}"),
            )
            .header("access_token", &self.delivery_token);
        if let Some(environment) = &self.environment {
            request = request.query(&[("environment", environment)]);
        }

        let response = self.ensure_success(request.send().await?).await?;
        let payload: EntryResponse = response.json().await?;
        Ok(payload.entry)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        self.client
            .request(method, format!("{base}/{path}"))
            .header("api_key", &self.api_key)
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, CmsError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = CmsError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "CMS request failed");
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

#[derive(Deserialize)]
struct ContentTypesResponse {
    #[serde(default)]
    content_types: Vec<ContentTypeDescription>,
}

#[derive(Deserialize)]
struct ContentTypeDescription {
    uid: String,
}

#[derive(Deserialize)]
struct EntriesResponse {
    #[serde(default)]
    entries: Vec<Value>,
}

#[derive(Deserialize)]
struct EntryResponse {
    entry: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    fn client(server: &MockServer, management_token: Option<&str>) -> CmsClient {
        CmsClient {
            client: Client::builder()
                .user_agent("semsync-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: "stack-key".into(),
            delivery_token: "delivery-token".into(),
            management_token: management_token.map(str::to_string),
            environment: Some("production".into()),
        }
    }

    #[tokio::test]
    async fn list_content_types_returns_uids() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v3/content_types")
                    .header("api_key", "stack-key")
                    .header("authorization", "mgmt-token");
                then.status(200).json_body(json!({
                    "content_types": [{ "uid": "page" }, { "uid": "article" }]
                }));
            })
            .await;

        let client = client(&server, Some("mgmt-token"));
        let types = client.list_content_types().await.expect("content types");
        mock.assert_async().await;
        assert_eq!(types, vec!["page".to_string(), "article".to_string()]);
    }

    #[tokio::test]
    async fn list_content_types_requires_management_token() {
        let server = MockServer::start_async().await;
        let client = client(&server, None);
        let error = client.list_content_types().await.expect_err("missing token");
        assert!(matches!(error, CmsError::MissingManagementToken));
    }

    #[tokio::test]
    async fn fetch_entries_passes_pagination_and_environment() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v3/content_types/page/entries")
                    .header("access_token", "delivery-token")
                    .query_param("skip", "100")
                    .query_param("limit", "100")
                    .query_param("environment", "production");
                then.status(200).json_body(json!({
                    "entries": [{ "uid": "blt1", "title": "Page one" }]
                }));
            })
            .await;

        let client = client(&server, None);
        let entries = client.fetch_entries("page", 100, 100).await.expect("entries");
        mock.assert_async().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["uid"], json!("blt1"));
    }

    #[tokio::test]
    async fn fetch_entry_unwraps_envelope() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/content_types/page/entries/blt1");
                then.status(200)
                    .json_body(json!({ "entry": { "uid": "blt1", "title": "Fresh" } }));
            })
            .await;

        let client = client(&server, None);
        let entry = client.fetch_entry("page", "blt1").await.expect("entry");
        assert_eq!(entry["title"], json!("Fresh"));
    }

    #[tokio::test]
    async fn upstream_failure_surfaces_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v3/content_types/page/entries/blt404");
                then.status(404).body("entry not found");
            })
            .await;

        let client = client(&server, None);
        let error = client
            .fetch_entry("page", "blt404")
            .await
            .expect_err("status error");
        match error {
            CmsError::UnexpectedStatus { status, body } => {
                assert_eq!(status.as_u16(), 404);
                assert_eq!(body, "entry not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
