use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing indexing and search activity.
#[derive(Default)]
pub struct SyncMetrics {
    entries_indexed: AtomicU64,
    events_processed: AtomicU64,
    searches: AtomicU64,
}

impl SyncMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed full reindex and the number of records it produced.
    pub fn record_reindex(&self, indexed: u64) {
        self.entries_indexed.fetch_add(indexed, Ordering::Relaxed);
    }

    /// Record a webhook event that mutated the index.
    pub fn record_event(&self, upserted: bool) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
        if upserted {
            self.entries_indexed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a served search query.
    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries_indexed: self.entries_indexed.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of activity counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Records written to the index since startup.
    pub entries_indexed: u64,
    /// Webhook events that resulted in an index mutation.
    pub events_processed: u64,
    /// Search queries served.
    pub searches: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_reindex_and_events() {
        let metrics = SyncMetrics::new();
        metrics.record_reindex(10);
        metrics.record_event(true);
        metrics.record_event(false);
        metrics.record_search();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.entries_indexed, 11);
        assert_eq!(snapshot.events_processed, 2);
        assert_eq!(snapshot.searches, 1);
    }

    #[test]
    fn snapshot_starts_at_zero() {
        let snapshot = SyncMetrics::new().snapshot();
        assert_eq!(snapshot.entries_indexed, 0);
        assert_eq!(snapshot.events_processed, 0);
        assert_eq!(snapshot.searches, 0);
    }
}
