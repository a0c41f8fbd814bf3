//! Sync status tracking
//!
//! Counters and timings observed by the API and the CLI. The tracker is the
//! single owner of these numbers; callers only receive [`SyncStatus`]
//! snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Number of recent syncs averaged into `avg_sync_time_ms`.
const DURATION_WINDOW: usize = 100;

/// Point-in-time view of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub enabled: bool,
    pub pending_count: usize,
    pub in_flight_count: usize,
    pub synced_count: u64,
    pub error_count: u64,
    pub dropped_count: u64,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub avg_sync_time_ms: f64,
    pub max_queue_size: usize,
    pub disabled_reason: Option<String>,
    /// Embeddings served by the hash fallback instead of the model
    pub embedding_fallback_count: u64,
}

#[derive(Debug)]
struct Inner {
    enabled: bool,
    disabled_reason: Option<String>,
    pending_count: usize,
    in_flight_count: usize,
    synced_count: u64,
    error_count: u64,
    dropped_count: u64,
    last_sync_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
    durations: VecDeque<Duration>,
    max_queue_size: usize,
}

pub struct StatusTracker {
    inner: RwLock<Inner>,
}

impl StatusTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: RwLock::new(Inner {
                enabled,
                disabled_reason: None,
                pending_count: 0,
                in_flight_count: 0,
                synced_count: 0,
                error_count: 0,
                dropped_count: 0,
                last_sync_time: None,
                last_error: None,
                durations: VecDeque::with_capacity(DURATION_WINDOW),
                max_queue_size: 0,
            }),
        }
    }

    /// Tracker for a vault that could not be opened.
    pub fn disabled(reason: impl Into<String>) -> Self {
        let mut tracker = Self::new(false);
        tracker.inner.get_mut().disabled_reason = Some(reason.into());
        tracker
    }

    pub async fn is_enabled(&self) -> bool {
        self.inner.read().await.enabled
    }

    /// Enabling clears any recorded disable reason.
    pub async fn set_enabled(&self, enabled: bool) {
        let mut inner = self.inner.write().await;
        inner.enabled = enabled;
        if enabled {
            inner.disabled_reason = None;
        }
    }

    pub async fn disable_with_reason(&self, reason: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.enabled = false;
        inner.disabled_reason = Some(reason.into());
    }

    /// Record the current queue length and track its high-water mark.
    pub async fn set_pending(&self, count: usize) {
        let mut inner = self.inner.write().await;
        inner.pending_count = count;
        inner.max_queue_size = inner.max_queue_size.max(count);
    }

    pub async fn set_dropped(&self, count: u64) {
        self.inner.write().await.dropped_count = count;
    }

    pub async fn record_started(&self, note_id: &str) {
        tracing::trace!(note_id, "Sync started");
        self.inner.write().await.in_flight_count += 1;
    }

    /// Record the outcome of one note sync.
    pub async fn record_completed(&self, note_id: &str, result: Result<(), String>, elapsed: Duration) {
        let mut inner = self.inner.write().await;
        inner.in_flight_count = inner.in_flight_count.saturating_sub(1);

        if inner.durations.len() == DURATION_WINDOW {
            inner.durations.pop_front();
        }
        inner.durations.push_back(elapsed);

        match result {
            Ok(()) => {
                inner.synced_count += 1;
                inner.last_sync_time = Some(Utc::now());
            }
            Err(message) => {
                inner.error_count += 1;
                inner.last_error = Some(format!("{}: {}", note_id, message));
            }
        }
    }

    pub async fn snapshot(&self) -> SyncStatus {
        let inner = self.inner.read().await;
        let avg_sync_time_ms = if inner.durations.is_empty() {
            0.0
        } else {
            let total: Duration = inner.durations.iter().sum();
            total.as_secs_f64() * 1000.0 / inner.durations.len() as f64
        };

        SyncStatus {
            enabled: inner.enabled,
            pending_count: inner.pending_count,
            in_flight_count: inner.in_flight_count,
            synced_count: inner.synced_count,
            error_count: inner.error_count,
            dropped_count: inner.dropped_count,
            last_sync_time: inner.last_sync_time,
            last_error: inner.last_error.clone(),
            avg_sync_time_ms,
            max_queue_size: inner.max_queue_size,
            disabled_reason: inner.disabled_reason.clone(),
            embedding_fallback_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_and_average() {
        let tracker = StatusTracker::new(true);
        for id in ["a", "b", "c"] {
            tracker.record_started(id).await;
        }
        tracker
            .record_completed("a", Ok(()), Duration::from_millis(10))
            .await;
        tracker
            .record_completed("b", Ok(()), Duration::from_millis(30))
            .await;
        tracker
            .record_completed("c", Err("graph store error: down".into()), Duration::from_millis(20))
            .await;

        let status = tracker.snapshot().await;
        assert_eq!(status.synced_count, 2);
        assert_eq!(status.error_count, 1);
        assert_eq!(status.in_flight_count, 0);
        assert!((status.avg_sync_time_ms - 20.0).abs() < 1e-6);
        assert!(status.last_sync_time.is_some());
        assert_eq!(status.last_error.as_deref(), Some("c: graph store error: down"));
    }

    #[tokio::test]
    async fn test_average_uses_recent_window() {
        let tracker = StatusTracker::new(true);
        for _ in 0..DURATION_WINDOW {
            tracker
                .record_completed("old", Ok(()), Duration::from_millis(1000))
                .await;
        }
        for _ in 0..DURATION_WINDOW {
            tracker
                .record_completed("new", Ok(()), Duration::from_millis(10))
                .await;
        }
        let status = tracker.snapshot().await;
        assert!((status.avg_sync_time_ms - 10.0).abs() < 1e-6);
        assert_eq!(status.synced_count, 2 * DURATION_WINDOW as u64);
    }

    #[tokio::test]
    async fn test_high_water_mark() {
        let tracker = StatusTracker::new(true);
        tracker.set_pending(5).await;
        tracker.set_pending(12).await;
        tracker.set_pending(2).await;
        let status = tracker.snapshot().await;
        assert_eq!(status.pending_count, 2);
        assert_eq!(status.max_queue_size, 12);
    }

    #[tokio::test]
    async fn test_enable_clears_disable_reason() {
        let tracker = StatusTracker::new(true);
        tracker.disable_with_reason("vault missing").await;
        let status = tracker.snapshot().await;
        assert!(!status.enabled);
        assert_eq!(status.disabled_reason.as_deref(), Some("vault missing"));

        tracker.set_enabled(true).await;
        let status = tracker.snapshot().await;
        assert!(status.enabled);
        assert!(status.disabled_reason.is_none());
    }

    #[test]
    fn test_status_serializes_expected_fields() {
        let status = tokio_test::block_on(StatusTracker::new(false).snapshot());
        let json = serde_json::to_value(&status).unwrap();
        for key in [
            "enabled",
            "pending_count",
            "in_flight_count",
            "synced_count",
            "error_count",
            "last_sync_time",
            "avg_sync_time_ms",
            "max_queue_size",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[tokio::test]
    async fn test_disabled_tracker_reports_reason() {
        let tracker = StatusTracker::disabled("vault missing");
        let status = tracker.snapshot().await;
        assert!(!status.enabled);
        assert_eq!(status.disabled_reason.as_deref(), Some("vault missing"));
        assert_eq!(status.pending_count, 0);
    }
}
