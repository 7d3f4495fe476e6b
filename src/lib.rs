//! blobstash — embedding-backed personal content store.
//!
//! Stores user content ("blobs") in SQLite with optional f32 vector
//! embeddings and a private/public visibility partition per item, and
//! answers "find the most relevant stored items for this query" with a
//! deterministic cosine-similarity ranking.
//!
//! The messaging-bot and web front ends are external collaborators: they
//! call the [`store::BlobStore`] and [`search::SimilarityRanker`]
//! contracts and supply content plus an [`embedding::EmbeddingProvider`].
//! A [`replica::ReplicaSync`] task keeps a read-optimized snapshot fresh
//! so browsing and search never contend with the writer, and
//! [`backfill::reprocess_missing`] regenerates embeddings for items that
//! were stored while the provider was unavailable.

pub mod backfill;
pub mod config;
pub mod embedding;
pub mod error;
pub mod pending;
pub mod replica;
pub mod search;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::StoreConfig;
pub use error::StoreError;
pub use search::SimilarityRanker;
pub use store::BlobStore;
pub use types::{Blob, PublicBlob, RankedMatch, SearchScope, User, VisibilityFilter};
