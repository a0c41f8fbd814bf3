//! HTTP control surface of the sync service

pub mod handlers;
pub mod routes;

pub use handlers::{ServerState, SyncState};
pub use routes::create_router;
