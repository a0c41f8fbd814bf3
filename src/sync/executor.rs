//! Applies a batch of pending updates to the graph and vector stores.
//!
//! Items are processed one at a time in batch order. A failing item never
//! aborts the batch: it is reported back so the pipeline can requeue it.

use super::dispatcher::Batch;
use super::error::{with_timeout, StoreKind, SyncError, SyncResult};
use super::queue::{PendingUpdate, Snapshot};
use super::status::StatusTracker;
use crate::embeddings::EmbeddingProvider;
use crate::neo4j::{GraphNote, GraphStore, RelationshipDescriptor, RelationshipKind};
use crate::notes::ParsedNote;
use crate::qdrant::{VectorPayload, VectorRecord, VectorStore, INITIAL_EFFECTIVENESS};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// What happened to one successfully processed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Graph written and a new vector record inserted
    Indexed,
    /// Graph written and the existing vector record refreshed in place
    Reindexed,
    /// Graph written, vector record already present
    VectorUnchanged,
    /// Graph written, no indexable text for a vector
    GraphOnly,
    /// Note deleted from both stores
    Removed,
}

/// Result of executing one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// `(note_id, outcome)` in batch order
    pub succeeded: Vec<(String, ItemOutcome)>,
    /// Updates to requeue, with the error that stopped them
    pub failed: Vec<(PendingUpdate, SyncError)>,
}

impl BatchReport {
    pub fn skipped_malformed(&self) -> usize {
        self.succeeded
            .iter()
            .filter(|(_, o)| *o == ItemOutcome::GraphOnly)
            .count()
    }
}

pub struct SyncExecutor {
    graph: Arc<dyn GraphStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    status: Arc<StatusTracker>,
    store_timeout: Duration,
    reembed_on_change: bool,
}

impl SyncExecutor {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        status: Arc<StatusTracker>,
        store_timeout: Duration,
        reembed_on_change: bool,
    ) -> Self {
        Self {
            graph,
            vectors,
            embedder,
            status,
            store_timeout,
            reembed_on_change,
        }
    }

    pub async fn execute(&self, batch: Batch) -> BatchReport {
        let mut report = BatchReport::default();

        for update in batch.items {
            self.status.record_started(&update.note_id).await;
            let started = std::time::Instant::now();
            let result = self.sync_one(&update).await;
            let elapsed = started.elapsed();

            match result {
                Ok(outcome) => {
                    tracing::debug!(
                        note_id = %update.note_id,
                        path = %update.relative_path,
                        ?outcome,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Synced note"
                    );
                    self.status
                        .record_completed(&update.note_id, Ok(()), elapsed)
                        .await;
                    report.succeeded.push((update.note_id.clone(), outcome));
                }
                Err(e) => {
                    tracing::warn!(
                        note_id = %update.note_id,
                        path = %update.relative_path,
                        error = %e,
                        "Failed to sync note"
                    );
                    self.status
                        .record_completed(&update.note_id, Err(e.to_string()), elapsed)
                        .await;
                    report.failed.push((update, e));
                }
            }
        }

        report
    }

    async fn sync_one(&self, update: &PendingUpdate) -> SyncResult<ItemOutcome> {
        match &update.snapshot {
            Snapshot::Removed => {
                self.remove(update).await?;
                Ok(ItemOutcome::Removed)
            }
            Snapshot::Content(content) => {
                let note = ParsedNote::parse(&update.vault_id, &update.relative_path, content);
                self.write_graph(&note).await?;

                match self.write_vector(&note).await {
                    Err(SyncError::MalformedContent { path }) => {
                        tracing::debug!(%path, "No indexable text, skipping vector record");
                        Ok(ItemOutcome::GraphOnly)
                    }
                    other => other,
                }
            }
        }
    }

    async fn write_graph(&self, note: &ParsedNote) -> SyncResult<()> {
        let timeout = self.store_timeout;
        let node = GraphNote::from_parsed(note, Utc::now());
        with_timeout(StoreKind::Graph, timeout, self.graph.upsert_note(&node)).await?;

        let relationships = RelationshipDescriptor::for_note(note);
        for rel in &relationships {
            with_timeout(StoreKind::Graph, timeout, self.graph.merge_relationship(rel)).await?;
        }

        for kind in [RelationshipKind::HasTag, RelationshipKind::LinksTo] {
            let keep: Vec<String> = relationships
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| r.target_id.clone())
                .collect();
            let removed = with_timeout(
                StoreKind::Graph,
                timeout,
                self.graph
                    .prune_relationships(&note.note_id, &note.vault_id, kind, &keep),
            )
            .await?;
            if removed > 0 {
                tracing::debug!(note_id = %note.note_id, %kind, removed, "Pruned stale relationships");
            }
        }

        Ok(())
    }

    async fn write_vector(&self, note: &ParsedNote) -> SyncResult<ItemOutcome> {
        let text = note
            .embedding_text()
            .ok_or_else(|| SyncError::MalformedContent {
                path: note.relative_path.clone(),
            })?;

        let timeout = self.store_timeout;
        let dimensions = self.embedder.dimensions();
        if dimensions == 0 {
            return Err(SyncError::Configuration(format!(
                "embedding model {} reports zero dimensions",
                self.embedder.model_name()
            )));
        }

        with_timeout(
            StoreKind::Vector,
            timeout,
            self.vectors.ensure_collection(&note.vault_id, dimensions),
        )
        .await?;
        let existing = with_timeout(
            StoreKind::Vector,
            timeout,
            self.vectors.find_by_note_id(&note.vault_id, &note.note_id),
        )
        .await?;

        let now = Utc::now();
        let (outcome, id, created_at, effectiveness, usage_count) = match existing {
            Some(stored)
                if !self.reembed_on_change || stored.payload.content_hash == note.content_hash =>
            {
                return Ok(ItemOutcome::VectorUnchanged);
            }
            Some(stored) => (
                ItemOutcome::Reindexed,
                stored.id,
                stored.payload.created_at,
                stored.payload.effectiveness,
                stored.payload.usage_count,
            ),
            None => (ItemOutcome::Indexed, Uuid::new_v4(), now, INITIAL_EFFECTIVENESS, 0),
        };

        let vector = with_timeout(StoreKind::Embedding, timeout, self.embedder.embed_text(&text)).await?;
        if vector.len() != dimensions {
            return Err(SyncError::EmbeddingUnavailable(format!(
                "{} returned {} dimensions, expected {}",
                self.embedder.model_name(),
                vector.len(),
                dimensions
            )));
        }

        let record = VectorRecord {
            id,
            vector,
            payload: VectorPayload {
                note_id: note.note_id.clone(),
                vault_id: note.vault_id.clone(),
                title: note.title.clone(),
                domain: note.domain.clone(),
                description: note.description.clone().unwrap_or_default(),
                content_hash: note.content_hash.clone(),
                effectiveness,
                usage_count,
                created_at,
                updated_at: now,
            },
        };
        with_timeout(
            StoreKind::Vector,
            timeout,
            self.vectors.upsert_record(&note.vault_id, &record),
        )
        .await?;

        Ok(outcome)
    }

    async fn remove(&self, update: &PendingUpdate) -> SyncResult<()> {
        let timeout = self.store_timeout;
        with_timeout(
            StoreKind::Graph,
            timeout,
            self.graph.delete_note(&update.note_id, &update.vault_id),
        )
        .await?;
        with_timeout(
            StoreKind::Vector,
            timeout,
            self.vectors.delete_by_note_id(&update.vault_id, &update.note_id),
        )
        .await
    }
}
