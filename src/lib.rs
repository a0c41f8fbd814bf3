//! Gaimplan Knowledge Sync
//!
//! Background pipeline keeping a Markdown vault in sync with:
//! - Neo4j knowledge graph of notes, tags and links
//! - Qdrant vector index of note descriptions
//! - Local fastembed embeddings with a deterministic hash fallback
//! - HTTP control surface for status, enable/disable and change notifications

pub mod api;
pub mod embeddings;
pub mod neo4j;
pub mod notes;
pub mod qdrant;
pub mod sync;
pub mod vault;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use embeddings::EmbeddingProvider;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub vault: VaultYamlConfig,
    pub neo4j: Neo4jYamlConfig,
    pub qdrant: QdrantYamlConfig,
    pub embeddings: EmbeddingsConfig,
    pub sync: SyncConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Vault configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VaultYamlConfig {
    pub path: String,
    /// Overrides the id derived from the vault path
    pub id: Option<String>,
}

impl Default for VaultYamlConfig {
    fn default() -> Self {
        Self {
            path: ".".into(),
            id: None,
        }
    }
}

/// Neo4j configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jYamlConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for Neo4jYamlConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: String::new(),
        }
    }
}

/// Qdrant configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QdrantYamlConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl Default for QdrantYamlConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".into(),
            api_key: None,
        }
    }
}

/// Embedding provider configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// `fastembed` (local model, hash fallback) or `hash`
    pub provider: String,
    pub model: String,
    /// Vector size for the `hash` provider
    pub dimensions: usize,
    pub cache_dir: Option<String>,
    /// Model calls slower than this fall back to the hash vector
    pub timeout_ms: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: "fastembed".into(),
            model: embeddings::fastembed::DEFAULT_MODEL.into(),
            dimensions: 384,
            cache_dir: None,
            timeout_ms: 5_000,
        }
    }
}

/// Sync pipeline configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub tick_interval_ms: u64,
    pub max_batch_size: usize,
    /// How long eligible updates may wait for the batch to fill up
    pub max_batch_wait_ms: u64,
    pub small_delay_ms: u64,
    pub medium_delay_ms: u64,
    pub large_delay_ms: u64,
    /// Notes below this size use the small delay
    pub small_max_bytes: usize,
    /// Notes below this size use the medium delay
    pub medium_max_bytes: usize,
    /// Distinct notes the queue holds before dropping new ones
    pub max_pending: usize,
    pub store_timeout_ms: u64,
    /// Re-embed notes whose content hash changed
    pub reembed_on_change: bool,
    /// Watch the vault for changes while serving
    pub watch: bool,
    /// Queue every note when the server starts
    pub resync_on_start: bool,
    /// Keyword relationships rebuilt on full resync
    pub semantic: SemanticConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_ms: 1_000,
            max_batch_size: 10,
            max_batch_wait_ms: 0,
            small_delay_ms: 2_000,
            medium_delay_ms: 5_000,
            large_delay_ms: 10_000,
            small_max_bytes: 10_000,
            medium_max_bytes: 100_000,
            max_pending: 10_000,
            store_timeout_ms: 10_000,
            reembed_on_change: false,
            watch: true,
            resync_on_start: true,
            semantic: SemanticConfig::default(),
        }
    }
}

/// Thresholds of the keyword relationship pass
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub enabled: bool,
    /// Pairs below this keyword similarity are never related
    pub min_similarity: f32,
    pub min_confidence: f32,
    pub highly_related: f32,
    pub related_to: f32,
    pub same_domain: f32,
    pub cross_domain: f32,
    pub loosely_related: f32,
    pub max_per_pair: usize,
    pub max_total: usize,
    /// Notes modified this close together are temporally related
    pub temporal_window_secs: i64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_similarity: 0.30,
            min_confidence: 0.30,
            highly_related: 0.70,
            related_to: 0.40,
            same_domain: 0.50,
            cross_domain: 0.60,
            loosely_related: 0.30,
            max_per_pair: 3,
            max_total: 1_000,
            temporal_window_secs: 3_600,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub vault_path: String,
    pub vault_id: Option<String>,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub server_port: u16,
    pub embeddings: EmbeddingsConfig,
    pub sync: SyncConfig,
}

/// First non-empty value among `names`.
fn env_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_var(&[name])?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {}", name, raw);
            None
        }
    }
}

impl Config {
    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. Store variables also
    /// accept the legacy `GAIMPLAN_` prefix.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let mut embeddings = yaml.embeddings;
        if let Some(provider) = env_var(&["EMBEDDING_PROVIDER"]) {
            embeddings.provider = provider;
        }
        if let Some(model) = env_var(&["FASTEMBED_MODEL"]) {
            embeddings.model = model;
        }
        if let Some(dir) = env_var(&["FASTEMBED_CACHE_DIR"]) {
            embeddings.cache_dir = Some(dir);
        }

        let mut sync = yaml.sync;
        if let Some(enabled) = env_parse("SYNC_ENABLED") {
            sync.enabled = enabled;
        }
        if let Some(ms) = env_parse("SYNC_TICK_INTERVAL_MS") {
            sync.tick_interval_ms = ms;
        }
        if let Some(size) = env_parse("SYNC_MAX_BATCH_SIZE") {
            sync.max_batch_size = size;
        }
        if let Some(ms) = env_parse("EMBEDDING_TIMEOUT_MS") {
            embeddings.timeout_ms = ms;
        }
        let semantic = &mut sync.semantic;
        for (name, field) in [
            ("GRAPH_MIN_SIMILARITY_THRESHOLD", &mut semantic.min_similarity),
            ("GRAPH_MIN_CONFIDENCE_THRESHOLD", &mut semantic.min_confidence),
            ("GRAPH_THRESHOLD_HIGHLY_RELATED", &mut semantic.highly_related),
            ("GRAPH_THRESHOLD_RELATED_TO", &mut semantic.related_to),
            ("GRAPH_THRESHOLD_SAME_DOMAIN", &mut semantic.same_domain),
            ("GRAPH_THRESHOLD_CROSS_DOMAIN", &mut semantic.cross_domain),
            ("GRAPH_THRESHOLD_LOOSELY_RELATED", &mut semantic.loosely_related),
        ] {
            if let Some(value) = env_parse(name) {
                *field = value;
            }
        }
        if let Some(max) = env_parse("GRAPH_MAX_RELATIONSHIPS_PER_PAIR") {
            semantic.max_per_pair = max;
        }
        if let Some(max) = env_parse("GRAPH_MAX_TOTAL_RELATIONSHIPS") {
            semantic.max_total = max;
        }

        let config = Self {
            vault_path: env_var(&["VAULT_PATH"]).unwrap_or(yaml.vault.path),
            vault_id: env_var(&["VAULT_ID"]).or(yaml.vault.id),
            neo4j_uri: env_var(&["NEO4J_URI", "GAIMPLAN_NEO4J_URI"]).unwrap_or(yaml.neo4j.uri),
            neo4j_user: env_var(&["NEO4J_USER", "GAIMPLAN_NEO4J_USER"]).unwrap_or(yaml.neo4j.user),
            neo4j_password: env_var(&["NEO4J_PASSWORD", "GAIMPLAN_NEO4J_PASSWORD"])
                .unwrap_or(yaml.neo4j.password),
            qdrant_url: env_var(&["QDRANT_URL", "GAIMPLAN_QDRANT_URL"]).unwrap_or(yaml.qdrant.url),
            qdrant_api_key: env_var(&["QDRANT_API_KEY", "GAIMPLAN_QDRANT_API_KEY"])
                .or(yaml.qdrant.api_key),
            server_port: env_parse("SERVER_PORT").unwrap_or(yaml.server.port),
            embeddings,
            sync,
        };

        if config.neo4j_password.is_empty() {
            tracing::warn!("NEO4J_PASSWORD is not set");
        }
        Ok(config)
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Application state
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<dyn neo4j::GraphStore>,
    pub vectors: Arc<dyn qdrant::VectorStore>,
    pub embedder: Arc<dyn embeddings::EmbeddingProvider>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Set up the store clients and load the embedding model. Stores that do
    /// not answer yet are only logged; the clients connect on later calls.
    pub async fn new(config: Config) -> Result<Self> {
        let graph =
            neo4j::Neo4jClient::lazy(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password);
        if let Err(e) = graph.ping().await {
            tracing::warn!("Neo4j not reachable yet, graph writes will be retried: {:#}", e);
        }

        let vectors = qdrant::QdrantVectorStore::new(&config.qdrant_url, config.qdrant_api_key.as_deref())?;
        if let Err(e) = vectors.health_check().await {
            tracing::warn!("Qdrant not reachable yet, vector writes will be retried: {:#}", e);
        }

        let embeddings_config = config.embeddings.clone();
        let embedder = tokio::task::spawn_blocking(move || {
            embeddings::FallbackEmbedder::from_config(&embeddings_config)
        })
        .await
        .context("Embedding model loader panicked")?;
        tracing::info!(
            model = embedder.model_name(),
            dimensions = embedder.dimensions(),
            "Embedding provider ready"
        );

        Ok(Self {
            graph: Arc::new(graph),
            vectors: Arc::new(vectors),
            embedder: Arc::new(embedder),
            config: Arc::new(config),
        })
    }

    /// Build the sync pipeline for the configured vault.
    pub fn pipeline(&self) -> sync::SyncResult<sync::SyncPipeline> {
        let vault = vault::Vault::open(&self.config.vault_path, self.config.vault_id.as_deref())?;
        tracing::info!(vault_id = vault.id(), root = %vault.root().display(), "Opened vault");

        let pipeline = sync::SyncPipeline::new(
            vault,
            &self.config.sync,
            self.graph.clone(),
            self.vectors.clone(),
            self.embedder.clone(),
        )?;
        Ok(pipeline)
    }

    /// API state for the configured vault. A vault that cannot be opened
    /// leaves sync disabled with the reason instead of failing.
    pub fn server_state(&self) -> api::ServerState {
        match self.pipeline() {
            Ok(pipeline) => {
                api::ServerState::new(Arc::new(pipeline), self.graph.clone(), self.vectors.clone())
            }
            Err(e) => {
                tracing::error!(error = %e, "Sync disabled, vault unavailable");
                api::ServerState::unavailable(e.to_string(), self.graph.clone(), self.vectors.clone())
            }
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Run the HTTP server, control loop and vault watcher until Ctrl-C.
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config).await?;
    let sync_config = state.config.sync.clone();
    let server_state = Arc::new(state.server_state());
    let pipeline = server_state.pipeline().cloned();

    let shutdown = CancellationToken::new();
    let mut control_loop = None;
    let mut watcher = None;
    if let Some(pipeline) = &pipeline {
        control_loop = Some(tokio::spawn(pipeline.clone().run(shutdown.clone())));

        let mut vault_watcher = vault::VaultWatcher::new(pipeline.clone());
        if sync_config.watch {
            vault_watcher.start().await?;
        }
        watcher = Some(vault_watcher);

        if sync_config.resync_on_start {
            pipeline.request_full_resync().await?;
        }
    }

    let router = api::create_router(server_state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);

    let signal = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("Shutting down");
            signal.cancel();
        })
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    if let Some(mut watcher) = watcher {
        watcher.stop().await;
    }
    if let Some(control_loop) = control_loop {
        control_loop.await.context("Sync loop panicked")?;
    }

    if let Some(pipeline) = pipeline {
        let summary = pipeline.flush().await;
        tracing::info!(
            synced = summary.synced,
            failures = summary.failures,
            remaining = summary.remaining,
            "Flushed sync queue"
        );
    }
    Ok(())
}

/// Queue every note of the vault and process the queue once.
pub async fn run_sync(config: Config) -> Result<sync::FlushSummary> {
    let state = AppState::new(config).await?;
    let pipeline = state.pipeline()?;

    let queued = pipeline.request_full_resync().await?;
    tracing::info!("Queued {} notes", queued);

    Ok(pipeline.flush().await)
}

/// Remove the vault from the graph and vector stores.
pub async fn clear_vault(config: Config) -> Result<String> {
    let state = AppState::new(config).await?;
    let pipeline = state.pipeline()?;
    pipeline.clear_stores().await?;
    Ok(pipeline.vault().id().to_string())
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod state_tests {
    use super::*;
    use crate::neo4j::mock::MockGraphStore;
    use crate::qdrant::mock::MockVectorStore;

    fn config(vault_path: &str) -> Config {
        Config {
            vault_path: vault_path.to_string(),
            vault_id: None,
            // Nothing listens on port 1.
            neo4j_uri: "bolt://127.0.0.1:1".into(),
            neo4j_user: "neo4j".into(),
            neo4j_password: "password".into(),
            qdrant_url: "http://127.0.0.1:1".into(),
            qdrant_api_key: None,
            server_port: 0,
            embeddings: EmbeddingsConfig {
                provider: "hash".into(),
                dimensions: 16,
                ..EmbeddingsConfig::default()
            },
            sync: SyncConfig::default(),
        }
    }

    fn mock_state(config: Config) -> AppState {
        AppState {
            graph: Arc::new(MockGraphStore::new()),
            vectors: Arc::new(MockVectorStore::new()),
            embedder: Arc::new(embeddings::FallbackEmbedder::hash_only(16)),
            config: Arc::new(config),
        }
    }

    #[tokio::test]
    async fn test_missing_vault_leaves_server_up_with_sync_disabled() {
        let state = mock_state(config("/nonexistent/gaimplan-vault-12345"));
        let server_state = state.server_state();

        assert!(server_state.pipeline().is_none());
        let status = server_state.status().await;
        assert!(!status.enabled);
        assert!(status
            .disabled_reason
            .unwrap()
            .contains("/nonexistent/gaimplan-vault-12345"));
    }

    #[tokio::test]
    async fn test_existing_vault_gets_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let state = mock_state(config(dir.path().to_str().unwrap()));
        let server_state = state.server_state();
        assert!(server_state.pipeline().is_some());
        assert!(server_state.status().await.enabled);
    }

    #[tokio::test]
    async fn test_app_state_starts_while_stores_are_down() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(config(dir.path().to_str().unwrap()))
            .await
            .unwrap();
        assert!(state.graph.health_check().await.is_err());
        assert_eq!(state.embedder.dimensions(), 16);
    }
}
