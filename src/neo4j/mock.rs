//! In-memory mock implementation of GraphStore for testing.
//!
//! Mirrors the MERGE semantics of the Cypher in `client.rs` using
//! `tokio::sync::RwLock` collections. Failures can be injected to exercise
//! retry paths. Conditionally compiled with `#[cfg(test)]`.

use crate::neo4j::models::*;
use crate::neo4j::traits::GraphStore;
use crate::notes::SemanticRelationship;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

type NoteKey = (String, String);

/// In-memory mock implementation of GraphStore for testing.
#[derive(Default)]
pub struct MockGraphStore {
    /// Synced notes keyed by (vault_id, note_id)
    pub notes: RwLock<HashMap<NoteKey, GraphNote>>,
    /// Link targets that have not been synced themselves, keyed like `notes`
    pub placeholders: RwLock<HashMap<NoteKey, String>>,
    /// Tag id → (name, vault_id)
    pub tags: RwLock<HashMap<String, (String, String)>>,
    pub relationships: RwLock<Vec<RelationshipDescriptor>>,
    /// Keyword relationships as (vault_id, relationship)
    pub semantic: RwLock<Vec<(String, SemanticRelationship)>>,
    pub upsert_calls: AtomicUsize,
    fail_next_upserts: AtomicUsize,
    upsert_delay: RwLock<Option<Duration>>,
    unreachable: AtomicBool,
}

impl MockGraphStore {
    /// Create a new empty MockGraphStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` `upsert_note` calls fail.
    pub fn fail_next_upserts(&self, n: usize) {
        self.fail_next_upserts.store(n, Ordering::SeqCst);
    }

    /// Delay every `upsert_note` call (for timeout tests).
    pub async fn set_upsert_delay(&self, delay: Duration) {
        *self.upsert_delay.write().await = Some(delay);
    }

    /// Make `health_check` fail while `true`.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub async fn note_count(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn note_content(&self, vault_id: &str, note_id: &str) -> Option<String> {
        self.notes
            .read()
            .await
            .get(&(vault_id.to_string(), note_id.to_string()))
            .map(|n| n.content.clone())
    }

    pub async fn semantic_count(&self, vault_id: &str) -> usize {
        self.semantic
            .read()
            .await
            .iter()
            .filter(|(v, _)| v == vault_id)
            .count()
    }

    fn key(vault_id: &str, note_id: &str) -> NoteKey {
        (vault_id.to_string(), note_id.to_string())
    }

    async fn note_exists(&self, vault_id: &str, note_id: &str) -> bool {
        let key = Self::key(vault_id, note_id);
        self.notes.read().await.contains_key(&key)
            || self.placeholders.read().await.contains_key(&key)
    }
}

#[async_trait]
impl GraphStore for MockGraphStore {
    async fn upsert_note(&self, note: &GraphNote) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.upsert_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.fail_next_upserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_upserts.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("injected graph failure");
        }

        let key = Self::key(&note.vault_id, &note.id);
        self.placeholders.write().await.remove(&key);
        self.notes.write().await.insert(key, note.clone());
        Ok(())
    }

    async fn merge_relationship(&self, rel: &RelationshipDescriptor) -> Result<()> {
        if !self.note_exists(&rel.vault_id, &rel.from_note_id).await {
            return Ok(());
        }

        match rel.kind {
            RelationshipKind::HasTag => {
                self.tags
                    .write()
                    .await
                    .entry(rel.target_id.clone())
                    .or_insert_with(|| (rel.target_name.clone(), rel.vault_id.clone()));
            }
            RelationshipKind::LinksTo => {
                if !self.note_exists(&rel.vault_id, &rel.target_id).await {
                    self.placeholders.write().await.insert(
                        Self::key(&rel.vault_id, &rel.target_id),
                        rel.target_name.clone(),
                    );
                }
            }
        }

        let mut rels = self.relationships.write().await;
        let exists = rels.iter().any(|r| {
            r.from_note_id == rel.from_note_id
                && r.vault_id == rel.vault_id
                && r.kind == rel.kind
                && r.target_id == rel.target_id
        });
        if !exists {
            rels.push(rel.clone());
        }
        Ok(())
    }

    async fn prune_relationships(
        &self,
        note_id: &str,
        vault_id: &str,
        kind: RelationshipKind,
        keep_target_ids: &[String],
    ) -> Result<usize> {
        let mut rels = self.relationships.write().await;
        let before = rels.len();
        rels.retain(|r| {
            !(r.from_note_id == note_id
                && r.vault_id == vault_id
                && r.kind == kind
                && !keep_target_ids.contains(&r.target_id))
        });
        Ok(before - rels.len())
    }

    async fn delete_note(&self, note_id: &str, vault_id: &str) -> Result<()> {
        let key = Self::key(vault_id, note_id);
        self.notes.write().await.remove(&key);
        self.placeholders.write().await.remove(&key);
        self.relationships.write().await.retain(|r| {
            !(r.vault_id == vault_id
                && (r.from_note_id == note_id
                    || (r.kind == RelationshipKind::LinksTo && r.target_id == note_id)))
        });
        self.semantic.write().await.retain(|(v, r)| {
            !(v == vault_id && (r.from_note_id == note_id || r.to_note_id == note_id))
        });
        Ok(())
    }

    async fn get_note(&self, note_id: &str, vault_id: &str) -> Result<Option<GraphNote>> {
        Ok(self
            .notes
            .read()
            .await
            .get(&Self::key(vault_id, note_id))
            .cloned())
    }

    async fn list_relationship_targets(
        &self,
        note_id: &str,
        vault_id: &str,
        kind: RelationshipKind,
    ) -> Result<Vec<String>> {
        let mut targets: Vec<String> = self
            .relationships
            .read()
            .await
            .iter()
            .filter(|r| r.from_note_id == note_id && r.vault_id == vault_id && r.kind == kind)
            .map(|r| r.target_id.clone())
            .collect();
        targets.sort();
        Ok(targets)
    }

    async fn replace_semantic_relationships(
        &self,
        vault_id: &str,
        relationships: &[SemanticRelationship],
    ) -> Result<usize> {
        let mut semantic = self.semantic.write().await;
        semantic.retain(|(v, _)| v != vault_id);

        for rel in relationships {
            let exists = semantic.iter().any(|(v, r)| {
                v == vault_id
                    && r.from_note_id == rel.from_note_id
                    && r.to_note_id == rel.to_note_id
                    && r.kind == rel.kind
            });
            if !exists {
                semantic.push((vault_id.to_string(), rel.clone()));
            }
        }
        Ok(relationships.len())
    }

    async fn clear_vault(&self, vault_id: &str) -> Result<()> {
        self.notes.write().await.retain(|(v, _), _| v != vault_id);
        self.placeholders.write().await.retain(|(v, _), _| v != vault_id);
        self.tags.write().await.retain(|_, (_, v)| v != vault_id);
        self.relationships
            .write()
            .await
            .retain(|r| r.vault_id != vault_id);
        self.semantic.write().await.retain(|(v, _)| v != vault_id);
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            anyhow::bail!("Neo4j unreachable");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::ParsedNote;
    use chrono::Utc;

    fn graph_note(vault: &str, path: &str, content: &str) -> (ParsedNote, GraphNote) {
        let parsed = ParsedNote::parse(vault, path, content);
        let node = GraphNote::from_parsed(&parsed, Utc::now());
        (parsed, node)
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MockGraphStore::new();
        let (_, node) = graph_note("v", "a.md", "hello");
        store.upsert_note(&node).await.unwrap();
        store.upsert_note(&node).await.unwrap();
        assert_eq!(store.note_count().await, 1);
    }

    #[tokio::test]
    async fn test_link_placeholder_promoted_on_sync() {
        let store = MockGraphStore::new();
        let (parsed, node) = graph_note("v", "a.md", "see [[b]]");
        store.upsert_note(&node).await.unwrap();
        for rel in RelationshipDescriptor::for_note(&parsed) {
            store.merge_relationship(&rel).await.unwrap();
        }
        assert_eq!(store.placeholders.read().await.len(), 1);

        let (_, target) = graph_note("v", "b.md", "target");
        store.upsert_note(&target).await.unwrap();
        assert!(store.placeholders.read().await.is_empty());
        assert_eq!(store.note_count().await, 2);
    }

    #[tokio::test]
    async fn test_relationship_requires_source_node() {
        let store = MockGraphStore::new();
        let (parsed, _) = graph_note("v", "a.md", "#tag");
        for rel in RelationshipDescriptor::for_note(&parsed) {
            store.merge_relationship(&rel).await.unwrap();
        }
        assert!(store.relationships.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MockGraphStore::new();
        let (_, node) = graph_note("v", "a.md", "x");
        store.fail_next_upserts(1);
        assert!(store.upsert_note(&node).await.is_err());
        assert!(store.upsert_note(&node).await.is_ok());
        assert_eq!(store.upsert_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_semantic_replace_is_idempotent() {
        use crate::notes::SemanticKind;

        let store = MockGraphStore::new();
        let rel = SemanticRelationship {
            from_note_id: "a".into(),
            to_note_id: "b".into(),
            kind: SemanticKind::RelatedTo,
            confidence: 0.7,
            similarity: 0.5,
            shared_keywords: vec!["graph".into()],
        };
        let rels = vec![rel.clone(), rel];

        store.replace_semantic_relationships("v", &rels).await.unwrap();
        store.replace_semantic_relationships("v", &rels).await.unwrap();
        assert_eq!(store.semantic_count("v").await, 1);

        store.delete_note("b", "v").await.unwrap();
        assert_eq!(store.semantic_count("v").await, 0);
    }
}
