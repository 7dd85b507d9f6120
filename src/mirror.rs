//! File-persisted mirror of the vectors sent to the external index.
//!
//! The mirror exists for offline inspection and local fallback search, not as
//! the primary query path. The whole table lives in memory and is rewritten
//! to disk after every mutation (write-through, no batching). Construct with
//! `None` for an in-memory-only store in tests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::RwLock;
use thiserror::Error;

/// Errors raised while persisting the mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Reading or writing the persistence file failed.
    #[error("Mirror file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Entries could not be serialized for persistence.
    #[error("Mirror serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One mirrored record, a superset of what the external index stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorEntry {
    /// Composite record identifier.
    pub id: String,
    /// Content type the entry belongs to.
    #[serde(rename = "contentType")]
    pub content_type: String,
    /// Locale code of the indexed entry.
    pub locale: String,
    /// Text that was embedded.
    pub text: String,
    /// Embedding vector sent to the index.
    pub embedding: Vec<f32>,
    /// Metadata stored with the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// RFC3339 timestamp of the last write.
    #[serde(rename = "indexedAt", default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<String>,
}

/// A mirror entry paired with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredMirrorEntry {
    /// Matched entry.
    pub entry: MirrorEntry,
    /// Cosine similarity against the query vector.
    pub score: f32,
}

/// Durable in-process table of mirrored vector records.
pub struct MirrorStore {
    path: Option<PathBuf>,
    entries: RwLock<Vec<MirrorEntry>>,
}

impl MirrorStore {
    /// Open a store, loading any previously persisted entries.
    ///
    /// A missing file starts empty; an unreadable or corrupt file is logged
    /// and also starts empty rather than blocking startup.
    pub fn new(path: Option<PathBuf>) -> Self {
        let entries = match &path {
            Some(path) if path.exists() => match std::fs::read_to_string(path) {
                Ok(raw) => match serde_json::from_str::<Vec<MirrorEntry>>(&raw) {
                    Ok(entries) => entries,
                    Err(error) => {
                        tracing::warn!(path = %path.display(), error = %error, "Mirror file unparseable; starting empty");
                        Vec::new()
                    }
                },
                Err(error) => {
                    tracing::warn!(path = %path.display(), error = %error, "Mirror file unreadable; starting empty");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        tracing::debug!(
            path = ?path,
            entries = entries.len(),
            "Mirror store loaded"
        );

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Replace an entry with a matching id, or append a new one.
    pub fn upsert(&self, entry: MirrorEntry) -> Result<(), MirrorError> {
        {
            let mut entries = self.entries.write().expect("mirror lock poisoned");
            match entries.iter_mut().find(|existing| existing.id == entry.id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        self.save()
    }

    /// Remove an entry by id, persisting only when something was removed.
    ///
    /// Returns whether an entry was present; an absent id is a no-op, not an
    /// error.
    pub fn remove(&self, id: &str) -> Result<bool, MirrorError> {
        let removed = {
            let mut entries = self.entries.write().expect("mirror lock poisoned");
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            entries.len() != before
        };
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Replace the whole table.
    pub fn set_all(&self, new_entries: Vec<MirrorEntry>) -> Result<(), MirrorError> {
        {
            let mut entries = self.entries.write().expect("mirror lock poisoned");
            *entries = new_entries;
        }
        self.save()
    }

    /// Linear-scan cosine-similarity search, descending by score.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<ScoredMirrorEntry> {
        let entries = self.entries.read().expect("mirror lock poisoned");
        let mut scored: Vec<ScoredMirrorEntry> = entries
            .iter()
            .map(|entry| ScoredMirrorEntry {
                score: cosine_similarity(query, &entry.embedding),
                entry: entry.clone(),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        scored
    }

    /// Number of mirrored entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("mirror lock poisoned").len()
    }

    /// Whether the mirror holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn save(&self) -> Result<(), MirrorError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let entries = self.entries.read().expect("mirror lock poisoned");
        let serialized = serde_json::to_string_pretty(&*entries)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }
}

/// Cosine similarity of two vectors.
///
/// Zero-norm or length-mismatched inputs score 0.0 instead of dividing by
/// zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, embedding: Vec<f32>) -> MirrorEntry {
        MirrorEntry {
            id: id.to_string(),
            content_type: "page".to_string(),
            locale: "en-us".to_string(),
            text: format!("text for {id}"),
            embedding,
            metadata: None,
            indexed_at: None,
        }
    }

    #[test]
    fn upsert_replaces_by_id() {
        let store = MirrorStore::new(None);
        store.upsert(entry("page_blt1", vec![1.0, 0.0])).expect("insert");
        store.upsert(entry("page_blt2", vec![0.0, 1.0])).expect("insert");
        store.upsert(entry("page_blt1", vec![0.5, 0.5])).expect("replace");

        assert_eq!(store.len(), 2);
        let hits = store.search(&[0.5, 0.5], 10);
        assert_eq!(hits[0].entry.id, "page_blt1");
    }

    #[test]
    fn remove_is_a_no_op_when_absent() {
        let store = MirrorStore::new(None);
        store.upsert(entry("page_blt1", vec![1.0, 0.0])).expect("insert");

        assert!(store.remove("page_blt1").expect("remove"));
        assert!(!store.remove("page_blt1").expect("repeat remove"));
        assert!(!store.remove("never_there").expect("absent remove"));
        assert!(store.is_empty());
    }

    #[test]
    fn search_ranks_by_cosine_similarity() {
        let store = MirrorStore::new(None);
        store.upsert(entry("aligned", vec![1.0, 0.0])).expect("insert");
        store.upsert(entry("orthogonal", vec![0.0, 1.0])).expect("insert");
        store.upsert(entry("close", vec![0.9, 0.1])).expect("insert");

        let hits = store.search(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.id, "aligned");
        assert_eq!(hits[1].entry.id, "close");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn zero_norm_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn mutations_write_through_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mirror.json");

        let store = MirrorStore::new(Some(path.clone()));
        store.upsert(entry("page_blt1", vec![1.0, 0.0])).expect("insert");

        let reloaded = MirrorStore::new(Some(path.clone()));
        assert_eq!(reloaded.len(), 1);

        reloaded.remove("page_blt1").expect("remove");
        let reloaded_again = MirrorStore::new(Some(path));
        assert!(reloaded_again.is_empty());
    }

    #[test]
    fn set_all_replaces_the_whole_table() {
        let store = MirrorStore::new(None);
        store.upsert(entry("stale", vec![1.0, 0.0])).expect("insert");

        store
            .set_all(vec![
                entry("page_blt1", vec![1.0, 0.0]),
                entry("page_blt2", vec![0.0, 1.0]),
            ])
            .expect("set all");

        assert_eq!(store.len(), 2);
        assert!(!store.remove("stale").expect("stale gone"));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mirror.json");
        std::fs::write(&path, "not json").expect("write");

        let store = MirrorStore::new(Some(path));
        assert!(store.is_empty());
    }
}
