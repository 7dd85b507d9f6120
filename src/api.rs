//! HTTP surface for the sync service.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `GET /content-types` – List content-type uids known to the CMS.
//! - `POST /reindex` (also `GET` for manual triggering) – Rebuild the vector
//!   index from every published entry and return the indexed count.
//! - `POST /search` – Embed a free-text query and return ranked matches above
//!   the configured score cutoff.
//! - `POST /webhook` – Verified ingestion point for CMS publish/unpublish
//!   events; applies an upsert or delete against the index and local mirror.
//! - `GET /metrics` – Observe indexing and search counters.
//! - `GET /stats` – Pass through the index's statistics document.
//!
//! Every response body carries an `ok` discriminator; failures pair
//! `ok:false` with a human-readable `error` string and a non-2xx status.

use crate::config::get_config;
use crate::processing::{EventOutcome, SearchError, SearchResult, SyncApi, SyncError};
use crate::webhook::verify_signature;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Build the HTTP router exposing the sync API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: SyncApi + 'static,
{
    Router::new()
        .route("/content-types", get(list_content_types::<S>))
        .route("/reindex", post(run_reindex::<S>).get(run_reindex::<S>))
        .route("/search", post(run_search::<S>))
        .route("/webhook", post(handle_webhook::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/stats", get(get_stats::<S>))
        .with_state(service)
}

/// Response body for `GET /content-types`.
#[derive(Serialize)]
struct ContentTypesResponse {
    ok: bool,
    #[serde(rename = "contentTypes")]
    content_types: Vec<String>,
}

/// List content-type uids, sorted ascending.
async fn list_content_types<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<ContentTypesResponse>, AppError>
where
    S: SyncApi,
{
    let content_types = service.list_content_types().await?;
    Ok(Json(ContentTypesResponse {
        ok: true,
        content_types,
    }))
}

/// Response body for `POST /reindex`.
#[derive(Serialize)]
struct ReindexResponse {
    ok: bool,
    indexed: usize,
}

/// Rebuild the index from every published entry.
async fn run_reindex<S>(State(service): State<Arc<S>>) -> Result<Json<ReindexResponse>, AppError>
where
    S: SyncApi,
{
    let outcome = service.reindex_all().await?;
    tracing::info!(indexed = outcome.indexed, "Reindex request completed");
    Ok(Json(ReindexResponse {
        ok: true,
        indexed: outcome.indexed,
    }))
}

/// Request body for the `POST /search` endpoint.
#[derive(Default, Deserialize)]
struct SearchRequest {
    /// Free-text query to embed and match.
    #[serde(default)]
    query: Option<String>,
}

/// Response body for `POST /search`.
#[derive(Serialize)]
struct SearchResponse {
    ok: bool,
    results: Vec<SearchResult>,
}

/// Serve a similarity search.
///
/// The body is parsed leniently: a missing or unparseable body degrades to an
/// empty query, which the pipeline rejects with the canonical 400.
async fn run_search<S>(
    State(service): State<Arc<S>>,
    body: Bytes,
) -> Result<Json<SearchResponse>, AppError>
where
    S: SyncApi,
{
    let request: SearchRequest = serde_json::from_slice(&body).unwrap_or_default();
    let query = request.query.unwrap_or_default();
    let results = service.search(&query).await?;
    Ok(Json(SearchResponse { ok: true, results }))
}

/// Apply a CMS webhook delivery.
///
/// Verification runs over the raw body before any parsing. Terminal paths
/// other than authentication failure and missing identifiers acknowledge with
/// 200 so the sender does not redeliver accepted payloads indefinitely.
async fn handle_webhook<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError>
where
    S: SyncApi,
{
    if let Some(secret) = get_config().webhook_secret.as_deref() {
        let header_value = headers
            .get("x-signature")
            .or_else(|| headers.get("x-secret"))
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if !verify_signature(secret, &body, header_value) {
            tracing::warn!("Webhook signature verification failed");
            return Err(AppError::new(StatusCode::UNAUTHORIZED, "Invalid signature"));
        }
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::new(StatusCode::BAD_REQUEST, "Invalid JSON payload"))?;

    let outcome = service.process_event(payload).await?;
    let body = match outcome {
        EventOutcome::Upserted { id } => {
            json!({ "ok": true, "action": "upsert", "id": id })
        }
        EventOutcome::Deleted { id } => {
            json!({ "ok": true, "action": "delete", "id": id })
        }
        EventOutcome::Ignored { reason } => json!({ "ok": true, "ignored": reason }),
    };
    Ok(Json(body))
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    ok: bool,
    #[serde(flatten)]
    snapshot: crate::metrics::MetricsSnapshot,
}

/// Return indexing and search counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsResponse>
where
    S: SyncApi,
{
    Json(MetricsResponse {
        ok: true,
        snapshot: service.metrics_snapshot(),
    })
}

/// Pass through the index's statistics document.
async fn get_stats<S>(State(service): State<Arc<S>>) -> Result<Json<Value>, AppError>
where
    S: SyncApi,
{
    let stats = service.index_stats().await?;
    Ok(Json(json!({ "ok": true, "stats": stats })))
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "ok": false, "error": self.message })),
        )
            .into_response()
    }
}

impl From<SyncError> for AppError {
    fn from(inner: SyncError) -> Self {
        let status = match inner {
            SyncError::MissingEntryId => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, inner.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(inner: SearchError) -> Self {
        let status = match inner {
            SearchError::EmptyQuery => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, inner.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::config::{CONFIG, Config, EmbeddingProvider};
    use crate::metrics::MetricsSnapshot;
    use crate::processing::{
        EventOutcome, ReindexOutcome, SearchError, SearchResult, SyncApi, SyncError,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use hmac::{Hmac, Mac};
    use serde_json::{Value, json};
    use sha2::Sha256;
    use std::sync::{Arc, Once};
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    fn hmac_hex(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("key");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn content_types_carry_ok_envelope() {
        ensure_test_config();
        let service = Arc::new(StubSyncService::default());
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/content-types")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["ok"], json!(true));
        assert_eq!(json["contentTypes"], json!(["article", "page"]));
    }

    #[tokio::test]
    async fn reindex_is_reachable_by_get_and_post() {
        ensure_test_config();
        let service = Arc::new(StubSyncService::default());

        for method in [Method::POST, Method::GET] {
            let app = create_router(service.clone());
            let response = app
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri("/reindex")
                        .body(Body::empty())
                        .expect("request"),
                )
                .await
                .expect("router response");

            assert_eq!(response.status(), StatusCode::OK);
            let json = read_json(response).await;
            assert_eq!(json["ok"], json!(true));
            assert_eq!(json["indexed"], json!(7));
        }
    }

    #[tokio::test]
    async fn search_without_query_is_a_bad_request() {
        ensure_test_config();
        let service = Arc::new(StubSyncService::default());
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/search")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert_eq!(json["ok"], json!(false));
        assert_eq!(json["error"], json!("Query is required"));
    }

    #[tokio::test]
    async fn search_returns_ranked_results() {
        ensure_test_config();
        let service = Arc::new(StubSyncService::default());
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/search")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "query": "pricing" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["ok"], json!(true));
        assert_eq!(json["results"][0]["id"], json!("page_blt1"));
        assert_eq!(json["results"][0]["metadata"]["title"], json!("Pricing"));
    }

    #[tokio::test]
    async fn webhook_accepts_hmac_and_raw_secret() {
        ensure_test_config();
        let payload = json!({
            "event": "entry.publish",
            "data": { "entry": { "uid": "blt1", "content_type_uid": "page" } }
        })
        .to_string();

        let signatures = [hmac_hex("test-secret", payload.as_bytes()), "test-secret".to_string()];
        for signature in signatures {
            let service = Arc::new(StubSyncService::default());
            let app = create_router(service.clone());

            let response = app
                .oneshot(
                    Request::builder()
                        .method(Method::POST)
                        .uri("/webhook")
                        .header("x-signature", signature)
                        .body(Body::from(payload.clone()))
                        .expect("request"),
                )
                .await
                .expect("router response");

            assert_eq!(response.status(), StatusCode::OK);
            let json = read_json(response).await;
            assert_eq!(json["ok"], json!(true));
            assert_eq!(json["action"], json!("upsert"));
            assert_eq!(service.recorded_payloads().await.len(), 1);
        }
    }

    #[tokio::test]
    async fn webhook_rejects_bad_signature_without_processing() {
        ensure_test_config();
        let service = Arc::new(StubSyncService::default());
        let app = create_router(service.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/webhook")
                    .header("x-signature", "not-the-secret")
                    .body(Body::from(r#"{"event":"entry.publish"}"#))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = read_json(response).await;
        assert_eq!(json["ok"], json!(false));
        assert_eq!(json["error"], json!("Invalid signature"));
        assert!(service.recorded_payloads().await.is_empty());
    }

    #[tokio::test]
    async fn webhook_missing_uid_is_a_bad_request() {
        ensure_test_config();
        let payload = json!({ "event": "entry.publish", "data": {} }).to_string();
        let service = Arc::new(StubSyncService::default());
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/webhook")
                    .header("x-secret", "test-secret")
                    .body(Body::from(payload))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert_eq!(json["ok"], json!(false));
        assert_eq!(json["error"], json!("Missing entry uid"));
    }

    #[tokio::test]
    async fn metrics_flatten_counter_snapshot() {
        ensure_test_config();
        let service = Arc::new(StubSyncService::default());
        let app = create_router(service);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["ok"], json!(true));
        assert_eq!(json["entriesIndexed"], json!(3));
    }

    #[derive(Default)]
    struct StubSyncService {
        payloads: Mutex<Vec<Value>>,
    }

    impl StubSyncService {
        async fn recorded_payloads(&self) -> Vec<Value> {
            self.payloads.lock().await.clone()
        }
    }

    #[async_trait]
    impl SyncApi for StubSyncService {
        async fn list_content_types(&self) -> Result<Vec<String>, SyncError> {
            Ok(vec!["article".into(), "page".into()])
        }

        async fn reindex_all(&self) -> Result<ReindexOutcome, SyncError> {
            Ok(ReindexOutcome { indexed: 7 })
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
            if query.trim().is_empty() {
                return Err(SearchError::EmptyQuery);
            }
            let mut metadata = serde_json::Map::new();
            metadata.insert("title".into(), json!("Pricing"));
            Ok(vec![SearchResult {
                id: "page_blt1".into(),
                score: 0.92,
                metadata: Some(metadata),
            }])
        }

        async fn process_event(&self, payload: Value) -> Result<EventOutcome, SyncError> {
            let uid = payload
                .pointer("/data/entry/uid")
                .and_then(Value::as_str)
                .map(str::to_string);
            self.payloads.lock().await.push(payload);
            match uid {
                Some(uid) => Ok(EventOutcome::Upserted {
                    id: format!("page_{uid}"),
                }),
                None => Err(SyncError::MissingEntryId),
            }
        }

        async fn index_stats(&self) -> Result<Value, SyncError> {
            Ok(json!({ "totalVectorCount": 0 }))
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                entries_indexed: 3,
                events_processed: 2,
                searches: 1,
            }
        }
    }

    fn ensure_test_config() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = CONFIG.set(Config {
                cms_base_url: "http://127.0.0.1:9001".into(),
                cms_api_key: "stack-key".into(),
                cms_delivery_token: "delivery-token".into(),
                cms_management_token: Some("mgmt-token".into()),
                cms_environment: None,
                index_host: "http://127.0.0.1:9002".into(),
                index_api_key: "index-key".into(),
                index_namespace: None,
                embedding_provider: EmbeddingProvider::Mock,
                embedding_dimension: 8,
                embed_batch_size: 16,
                openai_api_key: None,
                openai_embedding_model: "text-embedding-3-small".into(),
                openai_base_url: None,
                gemini_api_key: None,
                gemini_embedding_model: "text-embedding-004".into(),
                gemini_base_url: None,
                embedding_local_url: "http://127.0.0.1:8000/embed".into(),
                webhook_secret: Some("test-secret".into()),
                search_top_k: 5,
                search_min_score: 0.15,
                text_max_chars: 20_000,
                reindex_page_size: 100,
                mirror_path: None,
                server_port: None,
            });
        });
    }
}
