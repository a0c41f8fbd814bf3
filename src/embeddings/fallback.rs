//! Deterministic fallback embeddings
//!
//! When the local model cannot be loaded or fails on a call, notes are still
//! indexed with a SHA-256 derived pseudo-embedding of the same dimensionality.
//! The same text always yields a bit-identical vector.

use super::fastembed::{model_dimensions, parse_model_name, FastEmbedProvider};
use super::traits::EmbeddingProvider;
use crate::EmbeddingsConfig;
use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Hash-based embedding provider.
///
/// Each block of 8 dimensions comes from `sha256(text ‖ block_index)`, mapped
/// to `[-1.0, 1.0]`; the vector is then L2-normalized.
///
/// ```rust
/// use gaimplan_sync::embeddings::{EmbeddingProvider, HashEmbeddingProvider};
///
/// # tokio_test::block_on(async {
/// let provider = HashEmbeddingProvider::new(384);
/// let a = provider.embed_text("hello world").await.unwrap();
/// let b = provider.embed_text("hello world").await.unwrap();
/// assert_eq!(a.len(), 384);
/// assert_eq!(a, b);
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = Vec::with_capacity(self.dimensions);
        let mut block: u32 = 0;

        while embedding.len() < self.dimensions {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(block.to_le_bytes());
            let digest = hasher.finalize();

            for chunk in digest.chunks_exact(4) {
                if embedding.len() == self.dimensions {
                    break;
                }
                let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                let value = (raw as f64 / u32::MAX as f64) * 2.0 - 1.0;
                embedding.push(value as f32);
            }
            block = block.wrapping_add(1);
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "sha256-fallback"
    }
}

/// Primary provider with the hash provider behind it.
///
/// Never fails: a primary error, a call slower than the timeout or a vector
/// of the wrong size is logged and replaced by the hash embedding.
pub struct FallbackEmbedder {
    primary: Option<Arc<dyn EmbeddingProvider>>,
    fallback: HashEmbeddingProvider,
    fallback_count: AtomicU64,
    timeout: Option<Duration>,
}

impl FallbackEmbedder {
    /// Wrap `primary`; the fallback uses the primary's dimensionality.
    pub fn new(primary: Arc<dyn EmbeddingProvider>) -> Self {
        let dimensions = primary.dimensions();
        Self {
            primary: Some(primary),
            fallback: HashEmbeddingProvider::new(dimensions),
            fallback_count: AtomicU64::new(0),
            timeout: None,
        }
    }

    /// Give up on the primary after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// No model at all, every embedding is the hash embedding.
    pub fn hash_only(dimensions: usize) -> Self {
        Self {
            primary: None,
            fallback: HashEmbeddingProvider::new(dimensions),
            fallback_count: AtomicU64::new(0),
            timeout: None,
        }
    }

    /// Build from config. A model that fails to load degrades to hash-only
    /// with the model's nominal dimensionality, so the collection size does
    /// not change between runs.
    pub fn from_config(config: &EmbeddingsConfig) -> Self {
        if config.provider.eq_ignore_ascii_case("hash") {
            tracing::info!(dimensions = config.dimensions, "Using hash embeddings");
            return Self::hash_only(config.dimensions);
        }

        match FastEmbedProvider::from_config(config) {
            Ok(provider) => {
                Self::new(Arc::new(provider)).with_timeout(Duration::from_millis(config.timeout_ms))
            }
            Err(e) => {
                let dimensions = model_dimensions(&parse_model_name(&config.model));
                tracing::warn!(
                    error = %e,
                    dimensions,
                    "Embedding model unavailable, falling back to hash embeddings"
                );
                Self::hash_only(dimensions)
            }
        }
    }

    fn note_fallback(&self, count: usize) {
        self.fallback_count
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(primary) = &self.primary {
            let result = match self.timeout {
                Some(limit) => tokio::time::timeout(limit, primary.embed_text(text))
                    .await
                    .unwrap_or_else(|_| {
                        Err(anyhow::anyhow!("timed out after {}ms", limit.as_millis()))
                    }),
                None => primary.embed_text(text).await,
            };
            match result {
                Ok(v) if v.len() == self.fallback.dimensions => return Ok(v),
                Ok(v) => tracing::warn!(
                    expected = self.fallback.dimensions,
                    got = v.len(),
                    "Embedding dimension mismatch, using hash embedding"
                ),
                Err(e) => tracing::warn!(error = %e, "Embedding failed, using hash embedding"),
            }
        }

        self.note_fallback(1);
        Ok(self.fallback.embed(text))
    }

    fn dimensions(&self) -> usize {
        self.fallback.dimensions
    }

    fn model_name(&self) -> &str {
        match &self.primary {
            Some(primary) => primary.model_name(),
            None => self.fallback.model_name(),
        }
    }

    fn fallback_count(&self) -> u64 {
        self.fallback_count.load(Ordering::Relaxed)
    }
}
