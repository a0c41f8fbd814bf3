//! In-memory mock implementation of VectorStore for testing.
//!
//! Collections are `HashMap<Uuid, VectorRecord>` keyed by collection name.
//! Conditionally compiled with `#[cfg(test)]`.

use crate::qdrant::models::*;
use crate::qdrant::traits::VectorStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MockVectorStore {
    /// Collection name → (dimensions, points)
    pub collections: RwLock<HashMap<String, (usize, HashMap<Uuid, VectorRecord>)>>,
    pub upsert_calls: AtomicUsize,
    fail_next_upserts: AtomicUsize,
    unreachable: AtomicBool,
}

impl MockVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` `upsert_record` calls fail.
    pub fn fail_next_upserts(&self, n: usize) {
        self.fail_next_upserts.store(n, Ordering::SeqCst);
    }

    /// Make `health_check` fail while `true`.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// All records of the note in the vault's collection.
    pub async fn records_for(&self, vault_id: &str, note_id: &str) -> Vec<VectorRecord> {
        self.collections
            .read()
            .await
            .get(&collection_name(vault_id))
            .map(|(_, points)| {
                points
                    .values()
                    .filter(|r| r.payload.note_id == note_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn record_count(&self, vault_id: &str) -> usize {
        self.collections
            .read()
            .await
            .get(&collection_name(vault_id))
            .map(|(_, points)| points.len())
            .unwrap_or(0)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn ensure_collection(&self, vault_id: &str, dimensions: usize) -> Result<()> {
        self.collections
            .write()
            .await
            .entry(collection_name(vault_id))
            .or_insert_with(|| (dimensions, HashMap::new()));
        Ok(())
    }

    async fn upsert_record(&self, vault_id: &str, record: &VectorRecord) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_next_upserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_upserts.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("injected vector failure");
        }

        let mut collections = self.collections.write().await;
        let Some((dimensions, points)) = collections.get_mut(&collection_name(vault_id)) else {
            anyhow::bail!("Collection {} not found", collection_name(vault_id));
        };
        if record.vector.len() != *dimensions {
            anyhow::bail!(
                "Vector dimension error: expected dim: {}, got {}",
                dimensions,
                record.vector.len()
            );
        }
        points.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_note_id(&self, vault_id: &str, note_id: &str) -> Result<Option<StoredRecord>> {
        let collections = self.collections.read().await;
        let Some((_, points)) = collections.get(&collection_name(vault_id)) else {
            anyhow::bail!("Collection {} not found", collection_name(vault_id));
        };
        Ok(points
            .values()
            .find(|r| r.payload.note_id == note_id)
            .map(|r| StoredRecord {
                id: r.id,
                payload: r.payload.clone(),
            }))
    }

    async fn delete_by_note_id(&self, vault_id: &str, note_id: &str) -> Result<()> {
        if let Some((_, points)) = self
            .collections
            .write()
            .await
            .get_mut(&collection_name(vault_id))
        {
            points.retain(|_, r| r.payload.note_id != note_id);
        }
        Ok(())
    }

    async fn search_similar(
        &self,
        vault_id: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let collections = self.collections.read().await;
        let Some((_, points)) = collections.get(&collection_name(vault_id)) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<ScoredRecord> = points
            .values()
            .map(|r| ScoredRecord {
                id: r.id,
                score: cosine(vector, &r.vector),
                payload: r.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn drop_collection(&self, vault_id: &str) -> Result<()> {
        self.collections
            .write()
            .await
            .remove(&collection_name(vault_id));
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            anyhow::bail!("Qdrant unreachable");
        }
        Ok(())
    }
}
