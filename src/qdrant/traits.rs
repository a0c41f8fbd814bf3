//! VectorStore trait definition
//!
//! Abstract interface for the vector operations of the sync pipeline.
//! Collections are per vault; callers pass the vault id, not the collection.

use crate::qdrant::models::*;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the vault's collection (cosine distance) if it does not exist.
    async fn ensure_collection(&self, vault_id: &str, dimensions: usize) -> Result<()>;

    /// Insert the record, or overwrite the point with the same id.
    async fn upsert_record(&self, vault_id: &str, record: &VectorRecord) -> Result<()>;

    /// The record whose payload `note_id` matches, if any.
    async fn find_by_note_id(&self, vault_id: &str, note_id: &str) -> Result<Option<StoredRecord>>;

    /// Delete every record of the note. Missing collection or records are not an error.
    async fn delete_by_note_id(&self, vault_id: &str, note_id: &str) -> Result<()>;

    /// Up to `limit` records nearest to `vector`. A missing collection yields
    /// no results.
    async fn search_similar(
        &self,
        vault_id: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>>;

    /// Drop the vault's collection.
    async fn drop_collection(&self, vault_id: &str) -> Result<()>;

    /// Verify the vector store is reachable.
    async fn health_check(&self) -> Result<()>;
}
