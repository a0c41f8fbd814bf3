//! Local embedding provider using fastembed-rs (ONNX Runtime)
//!
//! Configuration comes from the `embeddings` config section, which can be
//! overridden by:
//! - `FASTEMBED_MODEL` (default: `all-minilm-l6-v2`)
//! - `FASTEMBED_CACHE_DIR` (default: fastembed's `.fastembed_cache`)

use super::traits::EmbeddingProvider;
use crate::EmbeddingsConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default model identifier (384d, small enough for a desktop vault).
pub const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

/// Model name → `EmbeddingModel` variant mapping.
///
/// Falls back to `AllMiniLML6V2` for unknown names.
pub fn parse_model_name(name: &str) -> EmbeddingModel {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            EmbeddingModel::AllMiniLML6V2
        }
        "all-minilm-l12-v2" => EmbeddingModel::AllMiniLML12V2,
        "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
        "multilingual-e5-small" | "intfloat/multilingual-e5-small" => {
            EmbeddingModel::MultilingualE5Small
        }
        "multilingual-e5-base" | "intfloat/multilingual-e5-base" => {
            EmbeddingModel::MultilingualE5Base
        }
        "nomic-embed-text-v1.5" => EmbeddingModel::NomicEmbedTextV15,
        _ => {
            tracing::warn!(
                model = name,
                "Unknown embedding model, falling back to AllMiniLML6V2 (384d)"
            );
            EmbeddingModel::AllMiniLML6V2
        }
    }
}

/// Get the embedding dimensions for a model variant.
pub fn model_dimensions(model: &EmbeddingModel) -> usize {
    TextEmbedding::get_model_info(model)
        .map(|info| info.dim)
        .unwrap_or(384)
}

/// Local embedding provider using fastembed-rs ONNX Runtime.
///
/// `embed()` needs `&mut self`, hence the mutex. Inference is CPU-bound and runs
/// on `spawn_blocking`.
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Load the given model, downloading it into `cache_dir` on first use.
    pub fn new(model_variant: EmbeddingModel, cache_dir: Option<PathBuf>) -> Result<Self> {
        let dimensions = model_dimensions(&model_variant);
        let model_name = format!("{:?}", model_variant);

        let mut options = TextInitOptions::new(model_variant).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let embedding =
            TextEmbedding::try_new(options).context("Failed to initialize fastembed ONNX model")?;

        tracing::info!(
            model = %model_name,
            dimensions,
            "FastEmbed provider initialized (local ONNX)"
        );

        Ok(Self {
            model: Arc::new(Mutex::new(embedding)),
            model_name,
            dimensions,
        })
    }

    /// Create a provider from the `embeddings` config section.
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let cache_dir = config
            .cache_dir
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self::new(parse_model_name(&config.model), cache_dir)
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let text = text.to_string();

        let embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model.blocking_lock();
            model.embed(vec![&text], None)
        })
        .await
        .context("FastEmbed spawn_blocking panicked")?
        .context("FastEmbed embed_text failed")?;

        embeddings
            .into_iter()
            .next()
            .context("FastEmbed returned empty embedding response")
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
