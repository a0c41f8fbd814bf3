//! Vector store models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Starting value of the `effectiveness` payload field.
pub const INITIAL_EFFECTIVENESS: f64 = 0.5;

/// Collection holding the vectors of one vault.
pub fn collection_name(vault_id: &str) -> String {
    format!("vault_{}", vault_id)
}

/// Payload stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPayload {
    pub note_id: String,
    pub vault_id: String,
    pub title: String,
    pub domain: String,
    pub description: String,
    pub content_hash: String,
    pub effectiveness: f64,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A point in the vector store. `id` is a fresh UUID, not the note id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: VectorPayload,
}

/// A record as returned by a lookup (vector omitted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: Uuid,
    pub payload: VectorPayload,
}

/// A search hit, most similar first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: Uuid,
    pub score: f32,
    pub payload: VectorPayload,
}
