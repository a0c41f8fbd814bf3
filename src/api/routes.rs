//! API route definitions

use super::handlers::{self, SyncState};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: SyncState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Sync control
        // ====================================================================
        .route("/api/sync/status", get(handlers::get_sync_status))
        .route("/api/sync/enabled", put(handlers::set_sync_enabled))
        .route("/api/sync/resync", post(handlers::request_resync))
        .route("/api/sync/clear", post(handlers::clear_stores))
        // ====================================================================
        // Note change notifications
        // ====================================================================
        .route("/api/notes/changed", post(handlers::note_changed))
        .route("/api/notes/removed", post(handlers::note_removed))
        .route("/api/notes/id", get(handlers::get_note_id))
        .route("/api/search", get(handlers::search_notes))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
