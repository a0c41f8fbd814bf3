//! GraphStore trait definition
//!
//! Abstract interface for the graph operations the sync pipeline needs,
//! so the executor can run against Neo4j or the in-memory mock.

use crate::neo4j::models::*;
use crate::notes::SemanticRelationship;
use anyhow::Result;
use async_trait::async_trait;

/// Abstract interface for graph database operations.
///
/// All writes are idempotent: repeating them leaves the graph unchanged.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create or update the node for `note` (keyed by id + vault id).
    async fn upsert_note(&self, note: &GraphNote) -> Result<()>;

    /// Merge one relationship, creating the target node if it does not exist.
    async fn merge_relationship(&self, rel: &RelationshipDescriptor) -> Result<()>;

    /// Remove relationships of `kind` from the note whose target id is not in
    /// `keep_target_ids`. Returns how many were removed.
    async fn prune_relationships(
        &self,
        note_id: &str,
        vault_id: &str,
        kind: RelationshipKind,
        keep_target_ids: &[String],
    ) -> Result<usize>;

    /// Delete the note node and its relationships. Missing notes are not an error.
    async fn delete_note(&self, note_id: &str, vault_id: &str) -> Result<()>;

    /// Fetch a note node.
    async fn get_note(&self, note_id: &str, vault_id: &str) -> Result<Option<GraphNote>>;

    /// Target ids of the note's relationships of `kind`, sorted.
    async fn list_relationship_targets(
        &self,
        note_id: &str,
        vault_id: &str,
        kind: RelationshipKind,
    ) -> Result<Vec<String>>;

    /// Replace the vault's keyword relationships with `relationships`.
    /// Endpoints that are not in the graph yet are created as placeholders.
    /// Returns how many were written.
    async fn replace_semantic_relationships(
        &self,
        vault_id: &str,
        relationships: &[SemanticRelationship],
    ) -> Result<usize>;

    /// Delete every node belonging to the vault.
    async fn clear_vault(&self, vault_id: &str) -> Result<()>;

    /// Verify the database is reachable.
    async fn health_check(&self) -> Result<()>;
}
