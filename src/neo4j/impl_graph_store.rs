//! `GraphStore` implementation for `Neo4jClient`.
//!
//! Every method delegates to the corresponding inherent method on `Neo4jClient`.

use async_trait::async_trait;

use super::client::Neo4jClient;
use super::models::*;
use super::traits::GraphStore;
use crate::notes::SemanticRelationship;

#[async_trait]
impl GraphStore for Neo4jClient {
    async fn upsert_note(&self, note: &GraphNote) -> anyhow::Result<()> {
        self.upsert_note(note).await
    }

    async fn merge_relationship(&self, rel: &RelationshipDescriptor) -> anyhow::Result<()> {
        self.merge_relationship(rel).await
    }

    async fn prune_relationships(
        &self,
        note_id: &str,
        vault_id: &str,
        kind: RelationshipKind,
        keep_target_ids: &[String],
    ) -> anyhow::Result<usize> {
        self.prune_relationships(note_id, vault_id, kind, keep_target_ids)
            .await
    }

    async fn delete_note(&self, note_id: &str, vault_id: &str) -> anyhow::Result<()> {
        self.delete_note(note_id, vault_id).await
    }

    async fn get_note(&self, note_id: &str, vault_id: &str) -> anyhow::Result<Option<GraphNote>> {
        self.get_note(note_id, vault_id).await
    }

    async fn list_relationship_targets(
        &self,
        note_id: &str,
        vault_id: &str,
        kind: RelationshipKind,
    ) -> anyhow::Result<Vec<String>> {
        self.list_relationship_targets(note_id, vault_id, kind)
            .await
    }

    async fn replace_semantic_relationships(
        &self,
        vault_id: &str,
        relationships: &[SemanticRelationship],
    ) -> anyhow::Result<usize> {
        self.replace_semantic_relationships(vault_id, relationships)
            .await
    }

    async fn clear_vault(&self, vault_id: &str) -> anyhow::Result<()> {
        self.clear_vault(vault_id).await
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.ping().await
    }
}
