//! Error taxonomy of the sync pipeline

use std::time::Duration;
use thiserror::Error;

/// Which external system an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Graph,
    Vector,
    Embedding,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Graph => write!(f, "graph store"),
            Self::Vector => write!(f, "vector store"),
            Self::Embedding => write!(f, "embedding provider"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// A store call failed; the update is requeued.
    #[error("{store} error: {source:#}")]
    TransientStore {
        store: StoreKind,
        #[source]
        source: anyhow::Error,
    },

    /// A store call exceeded its deadline; the update is requeued.
    #[error("{store} call timed out after {after:?}")]
    Timeout { store: StoreKind, after: Duration },

    /// No embedding could be produced.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The note has no indexable text.
    #[error("malformed content in {path}")]
    MalformedContent { path: String },

    /// The pipeline cannot run with the current configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// Errors that leave the update queued for the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientStore { .. } | Self::Timeout { .. } | Self::EmbeddingUnavailable(_)
        )
    }

    /// Errors that disable the pipeline.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Run a store call with a deadline, mapping failures to [`SyncError`].
pub async fn with_timeout<T, F>(store: StoreKind, after: Duration, fut: F) -> SyncResult<T>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(SyncError::TransientStore { store, source }),
        Err(_) => Err(SyncError::Timeout { store, after }),
    }
}
