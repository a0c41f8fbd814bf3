//! Embedding generation
//!
//! Trait + implementations, following the same layout as the stores:
//! - `EmbeddingProvider` trait: async interface for embedding generation
//! - `FastEmbedProvider`: local ONNX model via fastembed
//! - `HashEmbeddingProvider` / `FallbackEmbedder`: deterministic fallback

pub mod fallback;
pub mod fastembed;
pub mod traits;

pub use self::fastembed::FastEmbedProvider;
pub use fallback::{FallbackEmbedder, HashEmbeddingProvider};
pub use traits::EmbeddingProvider;
