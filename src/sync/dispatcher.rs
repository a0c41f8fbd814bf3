//! Batch formation on each control-loop tick

use super::queue::{DebounceQueue, PendingUpdate};
use super::status::StatusTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Updates handed to the executor together.
#[derive(Debug, Clone)]
pub struct Batch {
    /// FIFO by enqueue time
    pub items: Vec<PendingUpdate>,
    pub formed_at: Instant,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct BatchDispatcher {
    queue: Arc<DebounceQueue>,
    status: Arc<StatusTracker>,
    max_batch_size: usize,
    max_batch_wait: Duration,
}

impl BatchDispatcher {
    pub fn new(
        queue: Arc<DebounceQueue>,
        status: Arc<StatusTracker>,
        max_batch_size: usize,
        max_batch_wait: Duration,
    ) -> Self {
        Self {
            queue,
            status,
            max_batch_size: max_batch_size.max(1),
            max_batch_wait,
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Cut a batch if sync is enabled and enough eligible updates have
    /// accumulated, or the oldest of them has waited `max_batch_wait`.
    pub async fn tick(&self, now: Instant) -> Option<Batch> {
        if !self.status.is_enabled().await {
            return None;
        }

        let eligibility = self.queue.eligibility(now).await;
        let oldest_ready_at = eligibility.oldest_ready_at?;
        if eligibility.count < self.max_batch_size && oldest_ready_at + self.max_batch_wait > now {
            return None;
        }

        self.cut(now, eligibility.count).await
    }

    /// Cut a batch of whatever is eligible at `now`, without waiting for the
    /// batch to fill up. Used when flushing.
    pub async fn drain(&self, now: Instant) -> Option<Batch> {
        if !self.status.is_enabled().await {
            return None;
        }

        let eligibility = self.queue.eligibility(now).await;
        if eligibility.count == 0 {
            return None;
        }
        self.cut(now, eligibility.count).await
    }

    async fn cut(&self, now: Instant, eligible: usize) -> Option<Batch> {
        let items = self
            .queue
            .drain_eligible_up_to(now, self.max_batch_size)
            .await;
        self.status.set_pending(self.queue.len().await).await;
        if items.is_empty() {
            return None;
        }

        tracing::debug!(
            size = items.len(),
            remaining = eligible.saturating_sub(items.len()),
            "Formed sync batch"
        );
        Some(Batch {
            items,
            formed_at: now,
        })
    }
}
