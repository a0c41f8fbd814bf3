//! Qdrant client and models for note vectors

pub mod client;
mod impl_vector_store;
pub mod models;
pub mod traits;

pub use client::QdrantVectorStore;
pub use models::*;
pub use traits::VectorStore;

#[cfg(test)]
pub(crate) mod mock;
