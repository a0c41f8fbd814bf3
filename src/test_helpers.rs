//! Test helper factories and mock state builders
//!
//! Builds a `SyncPipeline` over a temporary vault with in-memory stores and
//! the hash embedder, plus the matching API state.
#![allow(dead_code)]

use crate::api::{ServerState, SyncState};
use crate::embeddings::FallbackEmbedder;
use crate::neo4j::mock::MockGraphStore;
use crate::qdrant::mock::MockVectorStore;
use crate::sync::SyncPipeline;
use crate::vault::Vault;
use crate::SyncConfig;
use std::sync::Arc;
use tempfile::TempDir;

/// Embedding size used by mock pipelines.
pub const TEST_DIMENSIONS: usize = 16;

/// A pipeline wired to in-memory stores. The vault lives as long as `dir`.
pub struct MockPipeline {
    pub dir: TempDir,
    pub graph: Arc<MockGraphStore>,
    pub vectors: Arc<MockVectorStore>,
    pub pipeline: Arc<SyncPipeline>,
}

/// Default sync settings with a short store timeout.
pub fn test_sync_config() -> SyncConfig {
    SyncConfig {
        store_timeout_ms: 2_000,
        watch: false,
        ..SyncConfig::default()
    }
}

/// Mock pipeline over a vault seeded with `(relative_path, content)` files.
pub fn mock_pipeline(files: &[(&str, &str)]) -> MockPipeline {
    mock_pipeline_with(test_sync_config(), files)
}

pub fn mock_pipeline_with(config: SyncConfig, files: &[(&str, &str)]) -> MockPipeline {
    let dir = TempDir::new().expect("create temp vault");
    for (path, content) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("create vault dir");
        }
        std::fs::write(&full, content).expect("write vault file");
    }

    let vault = Vault::open(dir.path(), None).expect("open temp vault");
    let graph = Arc::new(MockGraphStore::new());
    let vectors = Arc::new(MockVectorStore::new());
    let pipeline = SyncPipeline::new(
        vault,
        &config,
        graph.clone(),
        vectors.clone(),
        Arc::new(FallbackEmbedder::hash_only(TEST_DIMENSIONS)),
    )
    .expect("valid sync config");

    MockPipeline {
        dir,
        graph,
        vectors,
        pipeline: Arc::new(pipeline),
    }
}

/// API state sharing the mock pipeline's stores.
pub fn mock_server_state(mp: &MockPipeline) -> SyncState {
    Arc::new(ServerState::new(
        mp.pipeline.clone(),
        mp.graph.clone(),
        mp.vectors.clone(),
    ))
}
