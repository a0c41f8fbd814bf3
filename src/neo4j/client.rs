//! Neo4j client for the note graph

use super::models::*;
use crate::notes::{SemanticKind, SemanticRelationship};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph, Query};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for Neo4j operations
///
/// The connection is opened on first use and retried on later calls until it
/// succeeds, so the service can start while the database is still down.
pub struct Neo4jClient {
    uri: String,
    user: String,
    password: String,
    graph: OnceCell<Arc<Graph>>,
}

impl Neo4jClient {
    /// Connect, verify the connection and create constraints/indexes.
    pub async fn new(uri: &str, user: &str, password: &str) -> Result<Self> {
        let client = Self::lazy(uri, user, password);
        client.ping().await?;
        Ok(client)
    }

    /// Client that connects on its first query.
    pub fn lazy(uri: &str, user: &str, password: &str) -> Self {
        Self {
            uri: uri.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            graph: OnceCell::new(),
        }
    }

    async fn graph(&self) -> Result<&Arc<Graph>> {
        self.graph
            .get_or_try_init(|| async {
                let graph = tokio::time::timeout(
                    CONNECT_TIMEOUT,
                    Graph::new(&self.uri, &self.user, &self.password),
                )
                .await
                .with_context(|| format!("Timed out connecting to Neo4j at {}", self.uri))?
                .with_context(|| format!("Failed to connect to Neo4j at {}", self.uri))?;

                // The pool connects lazily; only keep a graph that answered.
                tokio::time::timeout(PING_TIMEOUT, graph.run(query("RETURN 1")))
                    .await
                    .context("Neo4j connectivity check timed out")?
                    .with_context(|| format!("Neo4j at {} did not answer", self.uri))?;

                Self::init_schema(&graph).await;
                tracing::info!(uri = %self.uri, "Connected to Neo4j");
                Ok::<_, anyhow::Error>(Arc::new(graph))
            })
            .await
    }

    /// Run a trivial query to verify the connection.
    pub async fn ping(&self) -> Result<()> {
        tokio::time::timeout(PING_TIMEOUT, self.execute("RETURN 1 AS ok"))
            .await
            .context("Neo4j connectivity check timed out")?
            .context("Neo4j connectivity check failed")?;
        Ok(())
    }

    async fn init_schema(graph: &Graph) {
        let constraints = vec![
            "CREATE CONSTRAINT note_id IF NOT EXISTS FOR (n:Note) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT tag_id IF NOT EXISTS FOR (t:Tag) REQUIRE t.id IS UNIQUE",
        ];

        let indexes = vec![
            "CREATE INDEX note_vault IF NOT EXISTS FOR (n:Note) ON (n.vault_id)",
            "CREATE INDEX note_title IF NOT EXISTS FOR (n:Note) ON (n.title)",
            "CREATE INDEX note_modified IF NOT EXISTS FOR (n:Note) ON (n.modified)",
            "CREATE INDEX tag_vault IF NOT EXISTS FOR (t:Tag) ON (t.vault_id)",
        ];

        for constraint in constraints {
            if let Err(e) = graph.run(query(constraint)).await {
                tracing::warn!("Constraint may already exist: {}", e);
            }
        }

        for index in indexes {
            if let Err(e) = graph.run(query(index)).await {
                tracing::warn!("Index may already exist: {}", e);
            }
        }
    }

    /// Execute a raw Cypher query (internal use only)
    pub(crate) async fn execute(&self, cypher: &str) -> Result<Vec<neo4rs::Row>> {
        self.execute_with_params(query(cypher)).await
    }

    /// Execute a parameterized Cypher query (internal use only)
    pub(crate) async fn execute_with_params(&self, q: Query) -> Result<Vec<neo4rs::Row>> {
        let mut result = self.graph().await?.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    // ========================================================================
    // Note operations
    // ========================================================================

    /// Create or update a note node. Also promotes a link placeholder.
    pub async fn upsert_note(&self, note: &GraphNote) -> Result<()> {
        let q = query(
            r#"
            MERGE (n:Note {id: $id, vault_id: $vault_id})
            ON CREATE SET n.created = datetime($modified)
            SET n.title = $title,
                n.path = $path,
                n.content = $content,
                n.modified = datetime($modified),
                n.placeholder = false
            "#,
        )
        .param("id", note.id.clone())
        .param("vault_id", note.vault_id.clone())
        .param("title", note.title.clone())
        .param("path", note.path.clone())
        .param("content", note.content.clone())
        .param("modified", note.modified.to_rfc3339());

        self.graph().await?.run(q).await.context("Failed to upsert note")?;
        Ok(())
    }

    /// Merge a HAS_TAG or LINKS_TO relationship.
    pub async fn merge_relationship(&self, rel: &RelationshipDescriptor) -> Result<()> {
        let cypher = match rel.kind {
            RelationshipKind::HasTag => {
                r#"
                MATCH (n:Note {id: $from_id, vault_id: $vault_id})
                MERGE (t:Tag {id: $target_id})
                ON CREATE SET t.name = $target_name, t.vault_id = $vault_id
                MERGE (n)-[:HAS_TAG]->(t)
                "#
            }
            RelationshipKind::LinksTo => {
                r#"
                MATCH (n:Note {id: $from_id, vault_id: $vault_id})
                MERGE (t:Note {id: $target_id, vault_id: $vault_id})
                ON CREATE SET t.path = $target_name,
                              t.title = $target_title,
                              t.placeholder = true
                MERGE (n)-[:LINKS_TO]->(t)
                "#
            }
        };

        let target_title = Path::new(&rel.target_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| rel.target_name.clone());

        let q = query(cypher)
            .param("from_id", rel.from_note_id.clone())
            .param("vault_id", rel.vault_id.clone())
            .param("target_id", rel.target_id.clone())
            .param("target_name", rel.target_name.clone())
            .param("target_title", target_title);

        self.graph()
            .await?
            .run(q)
            .await
            .with_context(|| format!("Failed to merge {} relationship", rel.kind))?;
        Ok(())
    }

    /// Delete relationships of `kind` whose target is not kept.
    pub async fn prune_relationships(
        &self,
        note_id: &str,
        vault_id: &str,
        kind: RelationshipKind,
        keep_target_ids: &[String],
    ) -> Result<usize> {
        let cypher = format!(
            r#"
            MATCH (n:Note {{id: $note_id, vault_id: $vault_id}})-[r:{rel}]->(t:{label})
            WHERE NOT t.id IN $keep
            DELETE r
            RETURN count(r) AS removed
            "#,
            rel = kind.rel_type(),
            label = kind.target_label(),
        );

        let q = query(&cypher)
            .param("note_id", note_id.to_string())
            .param("vault_id", vault_id.to_string())
            .param("keep", keep_target_ids.to_vec());

        let rows = self.execute_with_params(q).await?;
        let removed = rows
            .first()
            .and_then(|row| row.get::<i64>("removed").ok())
            .unwrap_or(0);
        Ok(removed.max(0) as usize)
    }

    /// Detach-delete the note node.
    pub async fn delete_note(&self, note_id: &str, vault_id: &str) -> Result<()> {
        let q = query(
            r#"
            MATCH (n:Note {id: $id, vault_id: $vault_id})
            DETACH DELETE n
            "#,
        )
        .param("id", note_id.to_string())
        .param("vault_id", vault_id.to_string());

        self.graph().await?.run(q).await.context("Failed to delete note")?;
        Ok(())
    }

    /// Fetch a synced (non-placeholder) note.
    pub async fn get_note(&self, note_id: &str, vault_id: &str) -> Result<Option<GraphNote>> {
        let q = query(
            r#"
            MATCH (n:Note {id: $id, vault_id: $vault_id})
            WHERE coalesce(n.placeholder, false) = false
            RETURN n.title AS title, n.path AS path,
                   coalesce(n.content, '') AS content,
                   toString(n.modified) AS modified
            "#,
        )
        .param("id", note_id.to_string())
        .param("vault_id", vault_id.to_string());

        let rows = self.execute_with_params(q).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let modified: String = row.get("modified").context("missing modified")?;
        let modified = DateTime::parse_from_rfc3339(&modified)
            .with_context(|| format!("invalid modified timestamp: {}", modified))?
            .with_timezone(&Utc);

        Ok(Some(GraphNote {
            id: note_id.to_string(),
            vault_id: vault_id.to_string(),
            title: row.get("title").context("missing title")?,
            path: row.get("path").context("missing path")?,
            content: row.get("content").context("missing content")?,
            modified,
        }))
    }

    /// Sorted target ids of the note's relationships of `kind`.
    pub async fn list_relationship_targets(
        &self,
        note_id: &str,
        vault_id: &str,
        kind: RelationshipKind,
    ) -> Result<Vec<String>> {
        let cypher = format!(
            r#"
            MATCH (n:Note {{id: $note_id, vault_id: $vault_id}})-[:{rel}]->(t:{label})
            RETURN t.id AS id
            ORDER BY id
            "#,
            rel = kind.rel_type(),
            label = kind.target_label(),
        );

        let q = query(&cypher)
            .param("note_id", note_id.to_string())
            .param("vault_id", vault_id.to_string());

        let rows = self.execute_with_params(q).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get::<String>("id").ok())
            .collect())
    }

    // ========================================================================
    // Keyword relationships
    // ========================================================================

    /// Drop the vault's keyword relationships and merge the new set.
    pub async fn replace_semantic_relationships(
        &self,
        vault_id: &str,
        relationships: &[SemanticRelationship],
    ) -> Result<usize> {
        let types: Vec<String> = SemanticKind::ALL
            .iter()
            .map(|kind| kind.rel_type().to_string())
            .collect();
        let q = query(
            r#"
            MATCH (:Note {vault_id: $vault_id})-[r]->(:Note {vault_id: $vault_id})
            WHERE type(r) IN $types
            DELETE r
            RETURN count(r) AS removed
            "#,
        )
        .param("vault_id", vault_id.to_string())
        .param("types", types);
        let rows = self.execute_with_params(q).await?;
        let removed = rows
            .first()
            .and_then(|row| row.get::<i64>("removed").ok())
            .unwrap_or(0);

        for rel in relationships {
            let cypher = format!(
                r#"
                MERGE (a:Note {{id: $from_id, vault_id: $vault_id}})
                ON CREATE SET a.placeholder = true
                MERGE (b:Note {{id: $to_id, vault_id: $vault_id}})
                ON CREATE SET b.placeholder = true
                MERGE (a)-[r:`{rel}`]->(b)
                SET r.confidence = $confidence,
                    r.similarity = $similarity,
                    r.method = 'semantic_analysis',
                    r.keywords_overlap = $keywords
                "#,
                rel = rel.kind.rel_type(),
            );
            let q = query(&cypher)
                .param("from_id", rel.from_note_id.clone())
                .param("to_id", rel.to_note_id.clone())
                .param("vault_id", vault_id.to_string())
                .param("confidence", f64::from(rel.confidence))
                .param("similarity", f64::from(rel.similarity))
                .param("keywords", rel.shared_keywords.clone());

            self.graph()
                .await?
                .run(q)
                .await
                .with_context(|| format!("Failed to merge {} relationship", rel.kind))?;
        }

        tracing::debug!(
            vault_id,
            removed,
            written = relationships.len(),
            "Replaced keyword relationships"
        );
        Ok(relationships.len())
    }

    /// Delete all notes and tags of the vault.
    pub async fn clear_vault(&self, vault_id: &str) -> Result<()> {
        let q = query(
            r#"
            MATCH (n {vault_id: $vault_id})
            WHERE n:Note OR n:Tag
            DETACH DELETE n
            "#,
        )
        .param("vault_id", vault_id.to_string());

        self.graph().await?.run(q).await.context("Failed to clear vault")?;
        tracing::info!(vault_id, "Cleared vault from graph");
        Ok(())
    }
}
