//! The embedding contract and its supporting pieces: the provider trait
//! collaborators implement, the binary vector codec used by the store,
//! and a local fastembed-backed default provider.

pub mod binary;
pub mod local;

use async_trait::async_trait;

pub use local::LocalEmbedder;

/// Produces fixed-dimension f32 vectors for text.
///
/// The store only depends on the vector contract: a provider must keep
/// one dimensionality for the lifetime of a store. Errors mean "no
/// embedding available right now" — callers in this crate degrade
/// (store without an embedding, skip the backfill row) rather than
/// aborting the surrounding operation.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}
