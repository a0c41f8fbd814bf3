//! Debounce/coalescing queue of pending note updates.
//!
//! ## Design
//!
//! A single map `note_id → PendingUpdate` behind one `tokio::sync::Mutex`:
//! 1. `enqueue` replaces any pending update for the same note and resets its
//!    debounce timer, so a burst of saves collapses into one update
//! 2. An update becomes eligible once the delay of its size class has elapsed
//!    since its last enqueue
//! 3. `drain_eligible*` removes eligible updates in FIFO order of enqueue time
//! 4. `requeue` returns a failed update unless a newer one already replaced it

use crate::notes::hashing::{normalize_relative_path, note_id};
use crate::sync::error::{SyncError, SyncResult};
use crate::SyncConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Size bucket of a note snapshot, selecting its debounce delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

/// Byte thresholds and per-class delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncePolicy {
    small_max_bytes: usize,
    medium_max_bytes: usize,
    small_delay: Duration,
    medium_delay: Duration,
    large_delay: Duration,
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self {
            small_max_bytes: 10_000,
            medium_max_bytes: 100_000,
            small_delay: Duration::from_secs(2),
            medium_delay: Duration::from_secs(5),
            large_delay: Duration::from_secs(10),
        }
    }
}

impl DebouncePolicy {
    /// Build a policy. Delays must not decrease with size and the byte
    /// thresholds must be increasing.
    pub fn new(
        small_max_bytes: usize,
        medium_max_bytes: usize,
        small_delay: Duration,
        medium_delay: Duration,
        large_delay: Duration,
    ) -> SyncResult<Self> {
        if small_max_bytes == 0 || small_max_bytes >= medium_max_bytes {
            return Err(SyncError::Configuration(format!(
                "size thresholds must satisfy 0 < small ({}) < medium ({})",
                small_max_bytes, medium_max_bytes
            )));
        }
        if !(small_delay <= medium_delay && medium_delay <= large_delay) {
            return Err(SyncError::Configuration(format!(
                "debounce delays must not decrease with size ({:?}, {:?}, {:?})",
                small_delay, medium_delay, large_delay
            )));
        }

        Ok(Self {
            small_max_bytes,
            medium_max_bytes,
            small_delay,
            medium_delay,
            large_delay,
        })
    }

    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(
            config.small_max_bytes,
            config.medium_max_bytes,
            Duration::from_millis(config.small_delay_ms),
            Duration::from_millis(config.medium_delay_ms),
            Duration::from_millis(config.large_delay_ms),
        )
    }

    pub fn classify(&self, bytes: usize) -> SizeClass {
        if bytes < self.small_max_bytes {
            SizeClass::Small
        } else if bytes < self.medium_max_bytes {
            SizeClass::Medium
        } else {
            SizeClass::Large
        }
    }

    pub fn delay_for(&self, class: SizeClass) -> Duration {
        match class {
            SizeClass::Small => self.small_delay,
            SizeClass::Medium => self.medium_delay,
            SizeClass::Large => self.large_delay,
        }
    }

    /// Longest delay of any class.
    pub fn max_delay(&self) -> Duration {
        self.large_delay
    }
}

/// What the update carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// Note text at enqueue time
    Content(String),
    /// The note file was deleted
    Removed,
}

/// A debounced change for one note.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    pub note_id: String,
    pub vault_id: String,
    pub relative_path: String,
    pub snapshot: Snapshot,
    pub enqueued_at: Instant,
    pub size_class: SizeClass,
}

impl PendingUpdate {
    pub fn new(
        vault_id: &str,
        relative_path: &str,
        snapshot: Snapshot,
        policy: &DebouncePolicy,
    ) -> Self {
        let relative_path = normalize_relative_path(relative_path);
        let size_class = match &snapshot {
            Snapshot::Content(text) => policy.classify(text.len()),
            Snapshot::Removed => SizeClass::Small,
        };

        Self {
            note_id: note_id(vault_id, &relative_path),
            vault_id: vault_id.to_string(),
            relative_path,
            snapshot,
            enqueued_at: Instant::now(),
            size_class,
        }
    }

    /// When the update becomes eligible for dispatch.
    pub fn ready_at(&self, policy: &DebouncePolicy) -> Instant {
        self.enqueued_at + policy.delay_for(self.size_class)
    }

    pub fn is_removal(&self) -> bool {
        matches!(self.snapshot, Snapshot::Removed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// First pending update for the note
    Inserted,
    /// Replaced an update still waiting for the same note
    Coalesced,
    /// Queue full, update discarded
    Dropped,
}

/// Eligible updates at a point in time, without removing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub count: usize,
    /// Earliest moment any of them became eligible
    pub oldest_ready_at: Option<Instant>,
}

pub struct DebounceQueue {
    policy: DebouncePolicy,
    max_pending: usize,
    pending: Mutex<HashMap<String, PendingUpdate>>,
    dropped: AtomicU64,
}

impl DebounceQueue {
    pub fn new(policy: DebouncePolicy, max_pending: usize) -> Self {
        Self {
            policy,
            max_pending: max_pending.max(1),
            pending: Mutex::new(HashMap::new()),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &DebouncePolicy {
        &self.policy
    }

    /// Insert or replace the pending update for `update.note_id`, stamping it
    /// with `now`. Never fails; a new note arriving while the queue is full is
    /// dropped and counted.
    pub async fn enqueue(&self, mut update: PendingUpdate, now: Instant) -> EnqueueOutcome {
        update.enqueued_at = now;

        let mut pending = self.pending.lock().await;
        if let Some(existing) = pending.get_mut(&update.note_id) {
            *existing = update;
            return EnqueueOutcome::Coalesced;
        }

        if pending.len() >= self.max_pending {
            drop(pending);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                note_id = %update.note_id,
                path = %update.relative_path,
                max_pending = self.max_pending,
                "Sync queue full, dropping update"
            );
            return EnqueueOutcome::Dropped;
        }

        pending.insert(update.note_id.clone(), update);
        EnqueueOutcome::Inserted
    }

    /// Remove and return every eligible update, oldest first.
    pub async fn drain_eligible(&self, now: Instant) -> std::vec::IntoIter<PendingUpdate> {
        self.drain_eligible_up_to(now, usize::MAX).await.into_iter()
    }

    /// Remove and return at most `limit` eligible updates, oldest first.
    /// The rest stay queued.
    pub async fn drain_eligible_up_to(&self, now: Instant, limit: usize) -> Vec<PendingUpdate> {
        let mut pending = self.pending.lock().await;

        let mut eligible: Vec<(Instant, String)> = pending
            .values()
            .filter(|u| u.ready_at(&self.policy) <= now)
            .map(|u| (u.enqueued_at, u.note_id.clone()))
            .collect();
        eligible.sort();
        eligible.truncate(limit);

        eligible
            .into_iter()
            .filter_map(|(_, id)| pending.remove(&id))
            .collect()
    }

    pub async fn eligibility(&self, now: Instant) -> Eligibility {
        let pending = self.pending.lock().await;
        let mut count = 0;
        let mut oldest_ready_at: Option<Instant> = None;

        for update in pending.values() {
            let ready_at = update.ready_at(&self.policy);
            if ready_at <= now {
                count += 1;
                oldest_ready_at = Some(match oldest_ready_at {
                    Some(t) => t.min(ready_at),
                    None => ready_at,
                });
            }
        }

        Eligibility {
            count,
            oldest_ready_at,
        }
    }

    /// Put back an update whose sync failed, keeping its original enqueue
    /// time. Returns `false` when a newer update for the note is already queued.
    pub async fn requeue(&self, update: PendingUpdate) -> bool {
        let mut pending = self.pending.lock().await;
        if pending.contains_key(&update.note_id) {
            return false;
        }
        pending.insert(update.note_id.clone(), update);
        true
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Updates dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
