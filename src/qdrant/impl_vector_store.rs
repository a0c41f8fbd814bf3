//! `VectorStore` implementation for `QdrantVectorStore`.
//!
//! Every method delegates to the corresponding inherent method.

use async_trait::async_trait;

use super::client::QdrantVectorStore;
use super::models::*;
use super::traits::VectorStore;

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, vault_id: &str, dimensions: usize) -> anyhow::Result<()> {
        self.ensure_collection(vault_id, dimensions).await
    }

    async fn upsert_record(&self, vault_id: &str, record: &VectorRecord) -> anyhow::Result<()> {
        self.upsert_record(vault_id, record).await
    }

    async fn find_by_note_id(
        &self,
        vault_id: &str,
        note_id: &str,
    ) -> anyhow::Result<Option<StoredRecord>> {
        self.find_by_note_id(vault_id, note_id).await
    }

    async fn delete_by_note_id(&self, vault_id: &str, note_id: &str) -> anyhow::Result<()> {
        self.delete_by_note_id(vault_id, note_id).await
    }

    async fn search_similar(
        &self,
        vault_id: &str,
        vector: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredRecord>> {
        self.search_similar(vault_id, vector, limit).await
    }

    async fn drop_collection(&self, vault_id: &str) -> anyhow::Result<()> {
        self.drop_collection(vault_id).await
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.health_check().await
    }
}
