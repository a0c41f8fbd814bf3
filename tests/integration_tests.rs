//! Integration tests for gaimplan-sync
//!
//! These tests require Neo4j and Qdrant to be running.
//! Run with: cargo test --test integration_tests

use gaimplan_sync::embeddings::FallbackEmbedder;
use gaimplan_sync::neo4j::{GraphStore, Neo4jClient, RelationshipKind};
use gaimplan_sync::notes::note_id;
use gaimplan_sync::qdrant::{QdrantVectorStore, VectorStore};
use gaimplan_sync::sync::SyncPipeline;
use gaimplan_sync::vault::Vault;
use gaimplan_sync::SyncConfig;
use std::sync::Arc;
use uuid::Uuid;

const BODY: &str = "Integration notes need a paragraph of at least fifty characters here.";

struct Backends {
    graph: Arc<Neo4jClient>,
    vectors: Arc<QdrantVectorStore>,
}

/// Connect to the stores, or `None` when either is unavailable.
async fn backends() -> Option<Backends> {
    let neo4j_uri = std::env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".into());
    let neo4j_user = std::env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".into());
    let neo4j_password = std::env::var("NEO4J_PASSWORD").unwrap_or_else(|_| "password".into());
    let qdrant_url = std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".into());

    let graph = match Neo4jClient::new(&neo4j_uri, &neo4j_user, &neo4j_password).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Neo4j not available at {}: {:#}", neo4j_uri, e);
            return None;
        }
    };

    let vectors = QdrantVectorStore::new(&qdrant_url, None).ok()?;
    if let Err(e) = vectors.health_check().await {
        eprintln!("Qdrant not available at {}: {:#}", qdrant_url, e);
        return None;
    }

    Some(Backends {
        graph: Arc::new(graph),
        vectors: Arc::new(vectors),
    })
}

fn test_config() -> SyncConfig {
    SyncConfig {
        watch: false,
        resync_on_start: false,
        ..SyncConfig::default()
    }
}

async fn pipeline_for(backends: &Backends, dir: &std::path::Path, vault_id: &str) -> SyncPipeline {
    let vault = Vault::open(dir, Some(vault_id)).unwrap();
    SyncPipeline::new(
        vault,
        &test_config(),
        backends.graph.clone(),
        backends.vectors.clone(),
        Arc::new(FallbackEmbedder::hash_only(32)),
    )
    .unwrap()
}

async fn cleanup(backends: &Backends, vault_id: &str) {
    backends.graph.clear_vault(vault_id).await.ok();
    backends.vectors.drop_collection(vault_id).await.ok();
}

#[tokio::test]
async fn test_full_resync_writes_both_stores() {
    let Some(backends) = backends().await else {
        eprintln!("Skipping test: backends not available");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("projects")).unwrap();
    std::fs::write(
        dir.path().join("projects/alpha.md"),
        format!("#rust #sync\n\nSee [[projects/beta]].\n\n{}", BODY),
    )
    .unwrap();
    std::fs::write(dir.path().join("projects/beta.md"), BODY).unwrap();

    let vault_id = format!("it_{}", Uuid::new_v4().simple());
    let pipeline = pipeline_for(&backends, dir.path(), &vault_id).await;

    assert_eq!(pipeline.request_full_resync().await.unwrap(), 2);
    let summary = pipeline.flush().await;
    assert_eq!(summary.synced, 2);
    assert_eq!(summary.remaining, 0);

    let alpha = note_id(&vault_id, "projects/alpha.md");
    let node = backends.graph.get_note(&alpha, &vault_id).await.unwrap().unwrap();
    assert_eq!(node.title, "alpha");

    let tags = backends
        .graph
        .list_relationship_targets(&alpha, &vault_id, RelationshipKind::HasTag)
        .await
        .unwrap();
    assert_eq!(tags.len(), 2);
    let links = backends
        .graph
        .list_relationship_targets(&alpha, &vault_id, RelationshipKind::LinksTo)
        .await
        .unwrap();
    assert_eq!(links, vec![note_id(&vault_id, "projects/beta.md")]);

    let record = backends
        .vectors
        .find_by_note_id(&vault_id, &alpha)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.payload.title, "alpha");
    assert_eq!(record.payload.domain, "projects");

    // Second sync of unchanged notes keeps the same vector record
    pipeline.request_full_resync().await.unwrap();
    pipeline.flush().await;
    let again = backends
        .vectors
        .find_by_note_id(&vault_id, &alpha)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.id, record.id);

    cleanup(&backends, &vault_id).await;
}

#[tokio::test]
async fn test_removal_and_tag_pruning() {
    let Some(backends) = backends().await else {
        eprintln!("Skipping test: backends not available");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let vault_id = format!("it_{}", Uuid::new_v4().simple());
    let pipeline = pipeline_for(&backends, dir.path(), &vault_id).await;
    let id = note_id(&vault_id, "n.md");

    pipeline
        .enqueue_change("n.md", format!("#old #kept\n\n{}", BODY))
        .await;
    pipeline.flush().await;
    pipeline.enqueue_change("n.md", format!("#kept\n\n{}", BODY)).await;
    pipeline.flush().await;

    let tags = backends
        .graph
        .list_relationship_targets(&id, &vault_id, RelationshipKind::HasTag)
        .await
        .unwrap();
    assert_eq!(tags, vec![format!("tag_{}_kept", vault_id)]);

    pipeline.enqueue_removal("n.md").await;
    pipeline.flush().await;
    assert!(backends.graph.get_note(&id, &vault_id).await.unwrap().is_none());
    assert!(backends
        .vectors
        .find_by_note_id(&vault_id, &id)
        .await
        .unwrap()
        .is_none());

    cleanup(&backends, &vault_id).await;
}

#[tokio::test]
async fn test_search_and_clear() {
    let Some(backends) = backends().await else {
        eprintln!("Skipping test: backends not available");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("graph.md"), format!("graph database query\n\n{}", BODY)).unwrap();
    std::fs::write(dir.path().join("garden.md"), "Tomatoes want sunlight and regular watering in summer.").unwrap();

    let vault_id = format!("it_{}", Uuid::new_v4().simple());
    let pipeline = pipeline_for(&backends, dir.path(), &vault_id).await;
    pipeline.request_full_resync().await.unwrap();
    assert_eq!(pipeline.flush().await.synced, 2);

    let hits = pipeline.search("graph database", 1).await.unwrap();
    assert_eq!(hits.len(), 1);

    pipeline.clear_stores().await.unwrap();
    let graph_id = note_id(&vault_id, "graph.md");
    assert!(backends.graph.get_note(&graph_id, &vault_id).await.unwrap().is_none());
    assert!(pipeline.search("graph database", 5).await.unwrap().is_empty());

    cleanup(&backends, &vault_id).await;
}
