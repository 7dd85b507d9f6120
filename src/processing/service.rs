//! Sync service coordinating extraction, embedding, index, and mirror writes.

use crate::{
    cms::CmsClient,
    config::get_config,
    embedding::{EmbeddingClient, get_embedding_client},
    metrics::{MetricsSnapshot, SyncMetrics},
    mirror::{MirrorEntry, MirrorStore},
    pinecone::{IndexService, VectorRecord, with_retry},
    processing::{
        metadata::{build_record_metadata, resolve_locale},
        text::entry_to_text,
        types::{EventOutcome, ReindexOutcome, SearchError, SearchResult, SyncError},
    },
    webhook::{EventKind, WebhookEvent, normalize_event, publish_environment},
};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Attempt budget for index writes on the webhook path.
const SYNC_RETRY_ATTEMPTS: u32 = 3;
/// Base delay of the linear backoff between retry attempts.
const SYNC_RETRY_BASE_DELAY: Duration = Duration::from_millis(300);

/// Coordinates the full pipeline: CMS reads, text extraction, embedding, and
/// writes to the external index and the local mirror.
///
/// The service owns long-lived handles to all collaborators so every surface
/// reuses the same components. Construct once near process start and share
/// through an `Arc`.
pub struct SyncService {
    cms: CmsClient,
    embedder: Box<dyn EmbeddingClient + Send + Sync>,
    index: IndexService,
    mirror: MirrorStore,
    metrics: Arc<SyncMetrics>,
}

/// Abstraction over the sync pipeline used by the HTTP surface.
#[async_trait]
pub trait SyncApi: Send + Sync {
    /// Enumerate content-type uids, sorted ascending.
    async fn list_content_types(&self) -> Result<Vec<String>, SyncError>;

    /// Rebuild the index from every published entry of every content type.
    async fn reindex_all(&self) -> Result<ReindexOutcome, SyncError>;

    /// Embed a free-text query and return ranked matches above the score cutoff.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;

    /// Apply one normalized webhook event against the index and mirror.
    async fn process_event(&self, payload: Value) -> Result<EventOutcome, SyncError>;

    /// Fetch the index's statistics document.
    async fn index_stats(&self) -> Result<Value, SyncError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl SyncService {
    /// Build a new sync service from the loaded configuration.
    pub fn new() -> Result<Self, SyncError> {
        let config = get_config();
        let cms = CmsClient::from_config(config)?;
        let embedder = get_embedding_client(config)?;
        let index = IndexService::from_config(config)?;
        let mirror = MirrorStore::new(config.mirror_path.clone().map(PathBuf::from));

        Ok(Self {
            cms,
            embedder,
            index,
            mirror,
            metrics: Arc::new(SyncMetrics::new()),
        })
    }

    /// Enumerate content-type uids, sorted ascending.
    pub async fn list_content_types(&self) -> Result<Vec<String>, SyncError> {
        let mut types = self.cms.list_content_types().await?;
        types.sort();
        Ok(types)
    }

    /// Rebuild the index from every published entry of every content type.
    ///
    /// Records are batched and upserted per content type, bounding memory and
    /// isolating partial failure to one type; any failure aborts the whole
    /// run, which is acceptable for an operator-triggered, re-runnable job.
    pub async fn reindex_all(&self) -> Result<ReindexOutcome, SyncError> {
        let types = self.list_content_types().await?;
        tracing::info!(types = types.len(), "Starting full reindex");

        let mut indexed = 0;
        for content_type in &types {
            let records = self.collect_records(content_type).await?;
            if records.is_empty() {
                tracing::debug!(content_type = %content_type, "No embeddable entries");
                continue;
            }
            self.index.upsert(&records).await?;
            indexed += records.len();
            tracing::info!(content_type = %content_type, records = records.len(), "Content type indexed");
        }

        self.metrics.record_reindex(indexed as u64);
        tracing::info!(indexed, "Full reindex complete");
        Ok(ReindexOutcome { indexed })
    }

    /// Paginate a content type's entries and build its vector records.
    async fn collect_records(&self, content_type: &str) -> Result<Vec<VectorRecord>, SyncError> {
        let config = get_config();
        let page_size = config.reindex_page_size.max(1);
        let mut records = Vec::new();
        let mut skip = 0;

        loop {
            let entries = self.cms.fetch_entries(content_type, skip, page_size).await?;
            let fetched = entries.len();

            let mut pending = Vec::new();
            for entry in entries {
                let Some(uid) = entry
                    .get("uid")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                else {
                    continue;
                };
                let text = entry_to_text(&entry, config.text_max_chars);
                if text.is_empty() {
                    tracing::debug!(content_type, uid = %uid, "Skipping entry without semantic text");
                    continue;
                }
                pending.push((uid, entry, text));
            }

            let texts: Vec<String> = pending.iter().map(|(_, _, text)| text.clone()).collect();
            let embeddings = self.embedder.embed_many(&texts).await?;
            for ((uid, entry, text), values) in pending.into_iter().zip(embeddings) {
                let metadata = build_record_metadata(&entry, content_type, &uid, &text);
                records.push(VectorRecord {
                    id: format!("{content_type}_{uid}"),
                    values,
                    metadata,
                });
            }

            // A short or empty page is the last one.
            if fetched < page_size {
                break;
            }
            skip += page_size;
        }

        Ok(records)
    }

    /// Apply one webhook event against the index and mirror.
    pub async fn process_event(&self, payload: Value) -> Result<EventOutcome, SyncError> {
        let event = normalize_event(&payload);
        tracing::debug!(event = %event.event_name, "Normalized webhook event");

        let Some(uid) = event.entry_uid.clone() else {
            return Err(SyncError::MissingEntryId);
        };

        match event.kind {
            EventKind::Publish => self.sync_publish(event, &payload, uid).await,
            EventKind::Unpublish | EventKind::Delete => self.sync_removal(event, uid).await,
            _ => {
                tracing::debug!(event = %event.event_name, "Event ignored");
                Ok(EventOutcome::Ignored {
                    reason: if event.event_name.is_empty() {
                        "unrecognized event".to_string()
                    } else {
                        event.event_name
                    },
                })
            }
        }
    }

    async fn sync_publish(
        &self,
        event: WebhookEvent,
        payload: &Value,
        uid: String,
    ) -> Result<EventOutcome, SyncError> {
        let config = get_config();
        let content_type = event.content_type_uid.clone();
        tracing::info!(uid = %uid, content_type = %content_type, "Publish event received");

        if let Some(target) = config.cms_environment.as_deref() {
            let environment = publish_environment(payload, &event.entry);
            if !environment.matches(target) {
                tracing::info!(
                    environment = environment.describe(),
                    target,
                    "Environment mismatch; event ignored"
                );
                return Ok(EventOutcome::Ignored {
                    reason: format!("environment mismatch: {}", environment.describe()),
                });
            }
        }

        // Prefer the authoritative current state over the webhook snapshot.
        let fresh = if !content_type.is_empty() && content_type != "entry" {
            match self.cms.fetch_entry(&content_type, &uid).await {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!(uid = %uid, content_type = %content_type, error = %error, "Fetching latest entry failed; using payload snapshot");
                    event.entry
                }
            }
        } else {
            event.entry
        };

        let text = entry_to_text(&fresh, config.text_max_chars);
        if text.is_empty() {
            tracing::info!(uid = %uid, content_type = %content_type, "No text extracted; event ignored");
            return Ok(EventOutcome::Ignored {
                reason: "no text extracted".to_string(),
            });
        }

        let embedding = self.embedder.embed(&text).await?;
        let composite_id = format!("{content_type}_{uid}");
        let metadata = build_record_metadata(&fresh, &content_type, &uid, &text);

        self.mirror.upsert(MirrorEntry {
            id: composite_id.clone(),
            content_type,
            locale: resolve_locale(&fresh).to_string(),
            text,
            embedding: embedding.clone(),
            metadata: Some(metadata.clone()),
            indexed_at: Some(current_timestamp_rfc3339()),
        })?;

        let record = VectorRecord {
            id: composite_id.clone(),
            values: embedding,
            metadata,
        };
        with_retry(SYNC_RETRY_ATTEMPTS, SYNC_RETRY_BASE_DELAY, || {
            self.index.upsert(std::slice::from_ref(&record))
        })
        .await?;

        self.metrics.record_event(true);
        tracing::info!(id = %composite_id, "Publish sync complete");
        Ok(EventOutcome::Upserted { id: composite_id })
    }

    async fn sync_removal(&self, event: WebhookEvent, uid: String) -> Result<EventOutcome, SyncError> {
        let composite_id = format!("{}_{}", event.content_type_uid, uid);
        tracing::info!(id = %composite_id, event = %event.event_name, "Removal event received");

        // The bare uid is tried as well: records written before the composite
        // id scheme were keyed that way.
        self.mirror.remove(&composite_id)?;
        self.mirror.remove(&uid)?;

        let ids = [composite_id.clone()];
        with_retry(SYNC_RETRY_ATTEMPTS, SYNC_RETRY_BASE_DELAY, || {
            self.index.delete(&ids)
        })
        .await?;

        self.metrics.record_event(false);
        tracing::info!(id = %composite_id, "Removal sync complete");
        Ok(EventOutcome::Deleted { id: composite_id })
    }

    /// Embed a query and return ranked matches above the score cutoff.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let config = get_config();
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let vector = self.embedder.embed(query).await?;
        let matches = self
            .index
            .query(&vector, config.search_top_k, true)
            .await?;
        let results = apply_score_cutoff(matches, config.search_min_score);

        self.metrics.record_search();
        tracing::debug!(results = results.len(), "Search served");
        Ok(results)
    }

    /// Fetch the index's statistics document.
    pub async fn index_stats(&self) -> Result<Value, SyncError> {
        Ok(self.index.describe_stats().await?)
    }

    /// Return the current activity metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl SyncApi for SyncService {
    async fn list_content_types(&self) -> Result<Vec<String>, SyncError> {
        SyncService::list_content_types(self).await
    }

    async fn reindex_all(&self) -> Result<ReindexOutcome, SyncError> {
        SyncService::reindex_all(self).await
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        SyncService::search(self, query).await
    }

    async fn process_event(&self, payload: Value) -> Result<EventOutcome, SyncError> {
        SyncService::process_event(self, payload).await
    }

    async fn index_stats(&self) -> Result<Value, SyncError> {
        SyncService::index_stats(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        SyncService::metrics_snapshot(self)
    }
}

/// Drop matches below the score cutoff, preserving the index's order.
///
/// Nearest-neighbor search always returns `top_k` results, even for nonsense
/// queries; the cutoff turns "always top-k" into "top-k above a confidence
/// bar, possibly empty".
fn apply_score_cutoff(
    matches: Vec<crate::pinecone::ScoredMatch>,
    min_score: f32,
) -> Vec<SearchResult> {
    matches
        .into_iter()
        .filter(|candidate| candidate.score >= min_score)
        .map(|candidate| SearchResult {
            id: candidate.id,
            score: candidate.score,
            metadata: candidate.metadata,
        })
        .collect()
}

/// Current timestamp formatted for mirror entries.
fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
