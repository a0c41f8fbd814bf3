//! Per-vault sync pipeline
//!
//! ## Design
//!
//! One `SyncPipeline` per vault owns the queue, dispatcher, executor and
//! status tracker. Change sources (watcher, HTTP API, full resync) call the
//! `enqueue_*` methods from any task; a single control loop calls
//! [`SyncPipeline::tick_once`] at a fixed interval. Only the executor awaits
//! on external stores.
//!
//! ## Usage
//!
//! ```ignore
//! let pipeline = Arc::new(SyncPipeline::new(vault, &config.sync, graph, vectors, embedder)?);
//! let shutdown = CancellationToken::new();
//! tokio::spawn(pipeline.clone().run(shutdown.clone()));
//! pipeline.enqueue_change("ideas/alpha.md", content).await;
//! ```

use super::dispatcher::{Batch, BatchDispatcher};
use super::error::{with_timeout, StoreKind, SyncError, SyncResult};
use super::executor::{BatchReport, SyncExecutor};
use super::queue::{DebouncePolicy, DebounceQueue, EnqueueOutcome, PendingUpdate, Snapshot};
use super::status::{StatusTracker, SyncStatus};
use crate::embeddings::EmbeddingProvider;
use crate::neo4j::GraphStore;
use crate::notes::semantic::{relate_notes, NoteSummary};
use crate::qdrant::{ScoredRecord, VectorStore};
use crate::vault::Vault;
use crate::{SemanticConfig, SyncConfig};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Deadline for writing the keyword relationships of a whole vault.
const SEMANTIC_WRITE_TIMEOUT: Duration = Duration::from_secs(120);

/// Totals of a [`SyncPipeline::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    pub synced: usize,
    pub failures: usize,
    /// Updates still queued afterwards (requeued failures)
    pub remaining: usize,
}

pub struct SyncPipeline {
    vault: Vault,
    queue: Arc<DebounceQueue>,
    status: Arc<StatusTracker>,
    dispatcher: BatchDispatcher,
    executor: SyncExecutor,
    graph: Arc<dyn GraphStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    semantic: SemanticConfig,
    store_timeout: Duration,
    tick_interval: Duration,
}

impl SyncPipeline {
    pub fn new(
        vault: Vault,
        config: &SyncConfig,
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> SyncResult<Self> {
        let policy = DebouncePolicy::from_config(config)?;
        let queue = Arc::new(DebounceQueue::new(policy, config.max_pending));
        let status = Arc::new(StatusTracker::new(config.enabled));
        let dispatcher = BatchDispatcher::new(
            queue.clone(),
            status.clone(),
            config.max_batch_size,
            Duration::from_millis(config.max_batch_wait_ms),
        );
        let store_timeout = Duration::from_millis(config.store_timeout_ms);
        let executor = SyncExecutor::new(
            graph.clone(),
            vectors.clone(),
            embedder.clone(),
            status.clone(),
            store_timeout,
            config.reembed_on_change,
        );

        Ok(Self {
            vault,
            queue,
            status,
            dispatcher,
            executor,
            graph,
            vectors,
            embedder,
            semantic: config.semantic.clone(),
            store_timeout,
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
        })
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Queue the new content of a note.
    pub async fn enqueue_change(&self, relative_path: &str, content: String) -> EnqueueOutcome {
        self.enqueue(relative_path, Snapshot::Content(content)).await
    }

    /// Queue the deletion of a note.
    pub async fn enqueue_removal(&self, relative_path: &str) -> EnqueueOutcome {
        self.enqueue(relative_path, Snapshot::Removed).await
    }

    /// Read a note file inside the vault and queue its content.
    pub async fn enqueue_file(&self, path: &Path) -> Result<EnqueueOutcome> {
        let (relative_path, content, _) = self.read_note(path).await?;
        Ok(self.enqueue_change(&relative_path, content).await)
    }

    /// Relative path, content and modification time of a note file.
    async fn read_note(&self, path: &Path) -> Result<(String, String, Option<DateTime<Utc>>)> {
        let relative_path = self
            .vault
            .relative_path(path)
            .with_context(|| format!("{} is outside the vault", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let modified = tokio::fs::metadata(path)
            .await
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok((relative_path, String::from_utf8_lossy(&bytes).into_owned(), modified))
    }

    async fn enqueue(&self, relative_path: &str, snapshot: Snapshot) -> EnqueueOutcome {
        let update = PendingUpdate::new(self.vault.id(), relative_path, snapshot, self.queue.policy());
        tracing::trace!(note_id = %update.note_id, path = %update.relative_path, "Queued note update");

        let outcome = self.queue.enqueue(update, Instant::now()).await;
        self.refresh_queue_counts().await;
        outcome
    }

    /// Queue every note in the vault and rebuild the keyword relationships
    /// between them. Returns how many notes were accepted.
    pub async fn request_full_resync(&self) -> Result<usize> {
        let vault = self.vault.clone();
        let paths = tokio::task::spawn_blocking(move || vault.scan_notes())
            .await
            .context("Vault scan task failed")?;

        let mut queued = 0;
        let mut summaries = Vec::with_capacity(paths.len());
        for path in &paths {
            let (relative_path, content, modified) = match self.read_note(path).await {
                Ok(note) => note,
                Err(e) => {
                    tracing::warn!("Skipping {}: {:#}", path.display(), e);
                    continue;
                }
            };
            summaries.push(NoteSummary::new(self.vault.id(), &relative_path, &content, modified));
            if self.enqueue_change(&relative_path, content).await != EnqueueOutcome::Dropped {
                queued += 1;
            }
        }

        tracing::info!(vault_id = %self.vault.id(), found = paths.len(), queued, "Full resync requested");

        if let Err(e) = self.rebuild_semantic_relationships(summaries).await {
            tracing::warn!(vault_id = %self.vault.id(), error = %e, "Keyword relationships not updated");
        }
        Ok(queued)
    }

    /// Replace the vault's keyword relationships. Returns how many were written.
    async fn rebuild_semantic_relationships(&self, summaries: Vec<NoteSummary>) -> SyncResult<usize> {
        if !self.semantic.enabled || !self.status.is_enabled().await {
            return Ok(0);
        }

        let config = self.semantic.clone();
        let relationships = tokio::task::spawn_blocking(move || relate_notes(&summaries, &config))
            .await
            .map_err(|e| SyncError::TransientStore {
                store: StoreKind::Graph,
                source: anyhow::Error::new(e).context("Keyword analysis task failed"),
            })?;

        let written = with_timeout(
            StoreKind::Graph,
            SEMANTIC_WRITE_TIMEOUT,
            self.graph
                .replace_semantic_relationships(self.vault.id(), &relationships),
        )
        .await?;
        tracing::info!(vault_id = %self.vault.id(), written, "Keyword relationships updated");
        Ok(written)
    }

    /// Notes whose vectors are nearest to the embedding of `query`.
    pub async fn search(&self, query: &str, limit: usize) -> SyncResult<Vec<ScoredRecord>> {
        let vector = with_timeout(
            StoreKind::Embedding,
            self.store_timeout,
            self.embedder.embed_text(query),
        )
        .await?;
        with_timeout(
            StoreKind::Vector,
            self.store_timeout,
            self.vectors.search_similar(self.vault.id(), &vector, limit),
        )
        .await
    }

    /// Remove the vault from both stores. Queued updates are kept.
    pub async fn clear_stores(&self) -> SyncResult<()> {
        let vault_id = self.vault.id();
        with_timeout(StoreKind::Graph, self.store_timeout, self.graph.clear_vault(vault_id)).await?;
        with_timeout(
            StoreKind::Vector,
            self.store_timeout,
            self.vectors.drop_collection(vault_id),
        )
        .await?;
        tracing::info!(vault_id, "Cleared vault from graph and vector stores");
        Ok(())
    }

    pub async fn set_enabled(&self, enabled: bool) {
        self.status.set_enabled(enabled).await;
        tracing::info!(vault_id = %self.vault.id(), enabled, "Sync enabled state changed");
    }

    pub async fn status(&self) -> SyncStatus {
        let mut status = self.status.snapshot().await;
        status.embedding_fallback_count = self.embedder.fallback_count();
        status
    }

    /// One control-loop iteration: form a batch, execute it, requeue failures.
    pub async fn tick_once(&self, now: Instant) -> Option<BatchReport> {
        let batch = self.dispatcher.tick(now).await?;
        Some(self.process(batch).await)
    }

    async fn process(&self, batch: Batch) -> BatchReport {
        let report = self.executor.execute(batch).await;

        for (update, error) in &report.failed {
            if error.is_configuration() {
                tracing::error!(vault_id = %self.vault.id(), error = %error, "Disabling sync");
                self.status.disable_with_reason(error.to_string()).await;
            }
            if !self.queue.requeue(update.clone()).await {
                tracing::debug!(note_id = %update.note_id, "Newer update queued, discarding failed snapshot");
            }
        }
        self.refresh_queue_counts().await;

        report
    }

    /// Process everything queued, ignoring debounce delays and the batch
    /// wait. Stops early when a whole batch fails or sync is disabled.
    pub async fn flush(&self) -> FlushSummary {
        let mut summary = FlushSummary::default();

        loop {
            let now = Instant::now() + self.queue.policy().max_delay();
            let Some(batch) = self.dispatcher.drain(now).await else {
                break;
            };
            let report = self.process(batch).await;
            summary.synced += report.succeeded.len();
            summary.failures += report.failed.len();
            if report.succeeded.is_empty() {
                break;
            }
        }

        summary.remaining = self.queue.len().await;
        summary
    }

    /// Run the control loop until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            vault_id = %self.vault.id(),
            tick_ms = self.tick_interval.as_millis() as u64,
            "Sync loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(vault_id = %self.vault.id(), "Sync loop stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Some(report) = self.tick_once(Instant::now()).await {
                        if !report.failed.is_empty() {
                            tracing::debug!(failed = report.failed.len(), "Requeued failed updates");
                        }
                    }
                }
            }
        }
    }

    async fn refresh_queue_counts(&self) {
        self.status.set_pending(self.queue.len().await).await;
        self.status.set_dropped(self.queue.dropped_count()).await;
    }
}
