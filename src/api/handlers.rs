//! API request handlers

use crate::neo4j::GraphStore;
use crate::notes::hashing::normalize_relative_path;
use crate::qdrant::VectorStore;
use crate::sync::{EnqueueOutcome, StatusTracker, SyncError, SyncPipeline, SyncStatus};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared server state
///
/// `pipeline` is `None` when the vault could not be opened; the server then
/// answers health and status requests and rejects everything else with 503.
pub struct ServerState {
    pipeline: Option<Arc<SyncPipeline>>,
    unavailable: StatusTracker,
    pub graph: Arc<dyn GraphStore>,
    pub vectors: Arc<dyn VectorStore>,
}

impl ServerState {
    pub fn new(
        pipeline: Arc<SyncPipeline>,
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            pipeline: Some(pipeline),
            unavailable: StatusTracker::new(false),
            graph,
            vectors,
        }
    }

    /// State without a pipeline; status reports sync disabled with `reason`.
    pub fn unavailable(
        reason: impl Into<String>,
        graph: Arc<dyn GraphStore>,
        vectors: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            pipeline: None,
            unavailable: StatusTracker::disabled(reason),
            graph,
            vectors,
        }
    }

    pub fn pipeline(&self) -> Option<&Arc<SyncPipeline>> {
        self.pipeline.as_ref()
    }

    fn require_pipeline(&self) -> Result<&Arc<SyncPipeline>, AppError> {
        self.pipeline
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("sync is disabled: vault unavailable".to_string()))
    }

    pub async fn status(&self) -> SyncStatus {
        match &self.pipeline {
            Some(pipeline) => pipeline.status().await,
            None => self.unavailable.snapshot().await,
        }
    }
}

pub type SyncState = Arc<ServerState>;

// ============================================================================
// Health check
// ============================================================================

#[derive(Serialize)]
pub struct ServiceHealthStatus {
    pub neo4j: String,
    pub qdrant: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// `None` when the vault could not be opened
    pub vault_id: Option<String>,
    pub services: ServiceHealthStatus,
}

fn connection_label(ok: bool) -> String {
    if ok { "connected" } else { "disconnected" }.to_string()
}

/// Health check handler.
///
/// Returns 200 `"ok"` when both stores answer, 503 `"degraded"` otherwise.
/// Sync keeps queueing either way.
pub async fn health(State(state): State<SyncState>) -> (StatusCode, Json<HealthResponse>) {
    let (graph, vectors) = tokio::join!(state.graph.health_check(), state.vectors.health_check());
    let neo4j_ok = graph.is_ok();
    let qdrant_ok = vectors.is_ok();

    let (http_status, status) = if neo4j_ok && qdrant_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            vault_id: state.pipeline().map(|p| p.vault().id().to_string()),
            services: ServiceHealthStatus {
                neo4j: connection_label(neo4j_ok),
                qdrant: connection_label(qdrant_ok),
            },
        }),
    )
}

// ============================================================================
// Sync control
// ============================================================================

pub async fn get_sync_status(State(state): State<SyncState>) -> Json<SyncStatus> {
    Json(state.status().await)
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

pub async fn set_sync_enabled(
    State(state): State<SyncState>,
    Json(req): Json<SetEnabledRequest>,
) -> Result<Json<SyncStatus>, AppError> {
    let pipeline = state.require_pipeline()?;
    pipeline.set_enabled(req.enabled).await;
    Ok(Json(pipeline.status().await))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResyncResponse {
    pub queued: usize,
}

pub async fn request_resync(
    State(state): State<SyncState>,
) -> Result<Json<ResyncResponse>, AppError> {
    let queued = state.require_pipeline()?.request_full_resync().await?;
    Ok(Json(ResyncResponse { queued }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub vault_id: String,
}

/// Remove the vault from the graph and vector stores.
pub async fn clear_stores(
    State(state): State<SyncState>,
) -> Result<Json<ClearResponse>, AppError> {
    let pipeline = state.require_pipeline()?;
    pipeline.clear_stores().await?;
    Ok(Json(ClearResponse {
        vault_id: pipeline.vault().id().to_string(),
    }))
}

// ============================================================================
// Search
// ============================================================================

const DEFAULT_SEARCH_LIMIT: usize = 10;
const MAX_SEARCH_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub note_id: String,
    pub title: String,
    pub domain: String,
    pub description: String,
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

/// Notes most similar to the query text.
pub async fn search_notes(
    State(state): State<SyncState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let text = query.q.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("q is required".to_string()));
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let hits = state.require_pipeline()?.search(text, limit).await?;
    Ok(Json(SearchResponse {
        results: hits
            .into_iter()
            .map(|hit| SearchHit {
                note_id: hit.payload.note_id,
                title: hit.payload.title,
                domain: hit.payload.domain,
                description: hit.payload.description,
                score: hit.score,
            })
            .collect(),
    }))
}

// ============================================================================
// Note change notifications
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NoteChangedRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteRemovedRequest {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoteIdQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub note_id: String,
    pub outcome: EnqueueOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoteIdResponse {
    pub note_id: String,
    pub vault_id: String,
}

/// Reject paths that are empty, not Markdown or escape the vault.
fn validate_note_path(path: &str) -> Result<String, AppError> {
    let normalized = normalize_relative_path(path.trim());
    if normalized.is_empty() {
        return Err(AppError::BadRequest("path is required".to_string()));
    }
    if normalized.split('/').any(|part| part == "..") {
        return Err(AppError::BadRequest(format!(
            "path must stay inside the vault: {}",
            path
        )));
    }
    if !normalized.to_lowercase().ends_with(".md") {
        return Err(AppError::BadRequest(format!(
            "only Markdown notes are synced: {}",
            path
        )));
    }
    Ok(normalized)
}

fn enqueued(
    pipeline: &SyncPipeline,
    path: &str,
    outcome: EnqueueOutcome,
) -> (StatusCode, Json<EnqueueResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            note_id: crate::notes::note_id(pipeline.vault().id(), path),
            outcome,
        }),
    )
}

pub async fn note_changed(
    State(state): State<SyncState>,
    Json(req): Json<NoteChangedRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), AppError> {
    let pipeline = state.require_pipeline()?;
    let path = validate_note_path(&req.path)?;
    let outcome = pipeline.enqueue_change(&path, req.content).await;
    Ok(enqueued(pipeline, &path, outcome))
}

pub async fn note_removed(
    State(state): State<SyncState>,
    Json(req): Json<NoteRemovedRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), AppError> {
    let pipeline = state.require_pipeline()?;
    let path = validate_note_path(&req.path)?;
    let outcome = pipeline.enqueue_removal(&path).await;
    Ok(enqueued(pipeline, &path, outcome))
}

pub async fn get_note_id(
    State(state): State<SyncState>,
    Query(query): Query<NoteIdQuery>,
) -> Result<Json<NoteIdResponse>, AppError> {
    let pipeline = state.require_pipeline()?;
    let path = validate_note_path(&query.path)?;
    let vault_id = pipeline.vault().id().to_string();
    Ok(Json(NoteIdResponse {
        note_id: crate::notes::note_id(&vault_id, &path),
        vault_id,
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    BadRequest(String),
    /// Sync is not running or a store did not answer
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        if err.is_transient() {
            AppError::Unavailable(err.to_string())
        } else {
            AppError::Internal(err.into())
        }
    }
}
