//! EmbeddingProvider trait definition
//!
//! Same shape as `GraphStore` and `VectorStore`: async trait + Send + Sync so
//! providers can be shared as `Arc<dyn EmbeddingProvider>`.

use anyhow::Result;
use async_trait::async_trait;

/// Abstract interface for generating vector embeddings from text.
///
/// # Implementations
///
/// - [`FastEmbedProvider`](super::FastEmbedProvider): local ONNX model
/// - [`HashEmbeddingProvider`](super::HashEmbeddingProvider): deterministic
///   SHA-256 pseudo-embedding, used when the model is unavailable
/// - [`FallbackEmbedder`](super::FallbackEmbedder): primary provider with the
///   hash provider behind it
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate a vector embedding for a single text input.
    ///
    /// Returns a vector of `f32` with length equal to [`dimensions()`](Self::dimensions).
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// The dimensionality of the vectors produced by this provider.
    ///
    /// Fixed for a given model; the Qdrant collection is created with it.
    fn dimensions(&self) -> usize;

    /// The name of the embedding model being used.
    fn model_name(&self) -> &str;

    /// Embeddings served by a fallback instead of the model.
    fn fallback_count(&self) -> u64 {
        0
    }
}
