//! Qdrant client for note vectors

use super::models::*;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, Condition, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance, FieldType, Filter, PointId,
    PointStruct, Query, QueryPointsBuilder, ScrollPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Client for Qdrant operations
pub struct QdrantVectorStore {
    client: Qdrant,
    /// Collections already verified or created in this process
    ensured: RwLock<HashSet<String>>,
}

impl QdrantVectorStore {
    pub fn new(url: &str, api_key: Option<&str>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .api_key(api_key.map(str::to_string))
            .build()
            .with_context(|| format!("Failed to build Qdrant client for {}", url))?;

        Ok(Self {
            client,
            ensured: RwLock::new(HashSet::new()),
        })
    }

    /// Verify the server answers.
    pub async fn health_check(&self) -> Result<()> {
        self.client
            .health_check()
            .await
            .context("Qdrant health check failed")?;
        Ok(())
    }

    pub async fn ensure_collection(&self, vault_id: &str, dimensions: usize) -> Result<()> {
        let name = collection_name(vault_id);
        if self.ensured.read().await.contains(&name) {
            return Ok(());
        }

        let exists = self
            .client
            .collection_exists(&name)
            .await
            .context("Failed to check collection")?;

        if !exists {
            tracing::info!(collection = %name, dimensions, "Creating Qdrant collection");
            let created = self
                .client
                .create_collection(
                    CreateCollectionBuilder::new(&name)
                        .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
                )
                .await;

            if let Err(e) = created {
                // Another writer may have created it in between.
                if !self.client.collection_exists(&name).await.unwrap_or(false) {
                    return Err(e).context("Failed to create collection");
                }
            }

            self.client
                .create_field_index(
                    CreateFieldIndexCollectionBuilder::new(&name, "note_id", FieldType::Keyword)
                        .wait(true),
                )
                .await
                .context("Failed to create note_id payload index")?;
        }

        self.ensured.write().await.insert(name);
        Ok(())
    }

    pub async fn upsert_record(&self, vault_id: &str, record: &VectorRecord) -> Result<()> {
        let point = PointStruct::new(
            record.id.to_string(),
            record.vector.clone(),
            Payload::from(payload_map(&record.payload)),
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection_name(vault_id), vec![point]).wait(true))
            .await
            .context("Failed to upsert vector")?;
        Ok(())
    }

    pub async fn find_by_note_id(
        &self,
        vault_id: &str,
        note_id: &str,
    ) -> Result<Option<StoredRecord>> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(collection_name(vault_id))
                    .filter(note_filter(note_id))
                    .limit(1)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .context("Failed to look up vector by note_id")?;

        let Some(point) = response.result.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(StoredRecord {
            id: point_uuid(point.id)?,
            payload: payload_to(&point.payload).context("Malformed vector payload")?,
        }))
    }

    pub async fn search_similar(
        &self,
        vault_id: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let name = collection_name(vault_id);
        if !self.client.collection_exists(&name).await? {
            return Ok(Vec::new());
        }

        let search = QueryPointsBuilder::new(name)
            .query(Query::new_nearest(vector.to_vec()))
            .with_payload(true)
            .limit(limit as u64);
        let response = self
            .client
            .query(search)
            .await
            .context("Failed to search vectors")?;

        response
            .result
            .into_iter()
            .map(|point| {
                Ok(ScoredRecord {
                    id: point_uuid(point.id)?,
                    score: point.score,
                    payload: payload_to(&point.payload).context("Malformed vector payload")?,
                })
            })
            .collect()
    }

    pub async fn delete_by_note_id(&self, vault_id: &str, note_id: &str) -> Result<()> {
        let name = collection_name(vault_id);
        if !self.client.collection_exists(&name).await? {
            return Ok(());
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(name)
                    .points(note_filter(note_id))
                    .wait(true),
            )
            .await
            .context("Failed to delete vectors")?;
        Ok(())
    }

    pub async fn drop_collection(&self, vault_id: &str) -> Result<()> {
        let name = collection_name(vault_id);
        self.ensured.write().await.remove(&name);
        if self.client.collection_exists(&name).await? {
            self.client
                .delete_collection(&name)
                .await
                .context("Failed to drop collection")?;
        }
        Ok(())
    }
}

fn point_uuid(id: Option<PointId>) -> Result<Uuid> {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(s)) => Uuid::parse_str(&s).context("Invalid point id"),
        other => anyhow::bail!("Unexpected point id: {:?}", other),
    }
}

fn note_filter(note_id: &str) -> Filter {
    Filter::must([Condition::matches("note_id", note_id.to_string())])
}

fn payload_map(payload: &VectorPayload) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert("note_id".to_string(), Value::from(payload.note_id.clone()));
    map.insert("vault_id".to_string(), Value::from(payload.vault_id.clone()));
    map.insert("title".to_string(), Value::from(payload.title.clone()));
    map.insert("domain".to_string(), Value::from(payload.domain.clone()));
    map.insert("description".to_string(), Value::from(payload.description.clone()));
    map.insert("content_hash".to_string(), Value::from(payload.content_hash.clone()));
    map.insert("effectiveness".to_string(), Value::from(payload.effectiveness));
    map.insert("usage_count".to_string(), Value::from(payload.usage_count));
    map.insert("created_at".to_string(), Value::from(payload.created_at.to_rfc3339()));
    map.insert("updated_at".to_string(), Value::from(payload.updated_at.to_rfc3339()));
    map
}

fn payload_to(map: &HashMap<String, Value>) -> Result<VectorPayload> {
    Ok(VectorPayload {
        note_id: payload_string(map, "note_id").context("missing note_id")?,
        vault_id: payload_string(map, "vault_id").unwrap_or_default(),
        title: payload_string(map, "title").unwrap_or_default(),
        domain: payload_string(map, "domain").unwrap_or_default(),
        description: payload_string(map, "description").unwrap_or_default(),
        content_hash: payload_string(map, "content_hash").unwrap_or_default(),
        effectiveness: payload_f64(map, "effectiveness").unwrap_or(INITIAL_EFFECTIVENESS),
        usage_count: payload_i64(map, "usage_count").unwrap_or(0),
        created_at: payload_time(map, "created_at").unwrap_or_else(Utc::now),
        updated_at: payload_time(map, "updated_at").unwrap_or_else(Utc::now),
    })
}

fn payload_string(map: &HashMap<String, Value>, key: &str) -> Option<String> {
    match &map.get(key)?.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn payload_f64(map: &HashMap<String, Value>, key: &str) -> Option<f64> {
    match &map.get(key)?.kind {
        Some(Kind::DoubleValue(v)) => Some(*v),
        Some(Kind::IntegerValue(v)) => Some(*v as f64),
        _ => None,
    }
}

fn payload_i64(map: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match &map.get(key)?.kind {
        Some(Kind::IntegerValue(v)) => Some(*v),
        Some(Kind::DoubleValue(v)) => Some(*v as i64),
        _ => None,
    }
}

fn payload_time(map: &HashMap<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let raw = payload_string(map, key)?;
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
