//! Cosine-similarity ranking over the store's visibility scopes.

pub mod math;

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedding::binary::decode_embedding;
use crate::error::StoreError;
use crate::store::BlobStore;
use crate::types::{PublicBlob, RankedMatch, SearchScope};
use math::cosine_similarity;

/// Flat multiplier applied to the requester's own items in
/// [`SearchScope::Unified`]. A deliberate relevance bias toward one's own
/// material when mixed with other owners' public content — a tunable
/// constant, not a probability adjustment.
pub const OWN_CONTENT_BOOST: f32 = 1.20;

/// Hits returned when the caller does not cap the list.
pub const DEFAULT_LIMIT: usize = 5;

pub struct SimilarityRanker {
    store: Arc<BlobStore>,
}

impl SimilarityRanker {
    pub fn new(store: Arc<BlobStore>) -> Self {
        Self { store }
    }

    /// Rank stored items against `query` within one visibility scope.
    ///
    /// Candidates that fail to decode or whose dimensionality mismatches
    /// the query are skipped, never fatal. Ties in score break by blob id
    /// descending, so equal-similarity results order newest-item-first
    /// deterministically. Truncation to `limit` happens only after the
    /// full candidate set is sorted.
    pub async fn rank(
        &self,
        query: &[f32],
        requesting_user_id: i64,
        scope: SearchScope,
        limit: usize,
    ) -> Result<Vec<RankedMatch>, StoreError> {
        if query.is_empty() {
            warn!("Empty query vector, returning no matches");
            return Ok(Vec::new());
        }

        let candidates = self
            .store
            .search_candidates(requesting_user_id, scope)
            .await?;

        let mut scored: Vec<RankedMatch> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let embedding = match decode_embedding(&candidate.embedding) {
                Ok(v) => v,
                Err(e) => {
                    warn!(blob_id = candidate.id, error = %e, "Skipping undecodable embedding");
                    continue;
                }
            };
            if embedding.len() != query.len() {
                warn!(
                    blob_id = candidate.id,
                    got = embedding.len(),
                    expected = query.len(),
                    "Skipping embedding with mismatched dimensionality"
                );
                continue;
            }

            let mut score = cosine_similarity(query, &embedding);
            if scope == SearchScope::Unified && candidate.user_id == requesting_user_id {
                score *= OWN_CONTENT_BOOST;
            }
            debug!(blob_id = candidate.id, score, "Scored candidate");

            scored.push(RankedMatch {
                blob_id: candidate.id,
                content: candidate.content,
                content_type: candidate.content_type,
                summary: candidate.summary,
                score,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(b.blob_id.cmp(&a.blob_id))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    /// Public items most similar to one public item, excluding itself.
    ///
    /// A missing, private, or unembedded source item yields an empty
    /// list rather than an error — the browsing surface renders "no
    /// related items" either way.
    pub async fn similar_to(
        &self,
        blob_id: i64,
        limit: usize,
    ) -> Result<Vec<PublicBlob>, StoreError> {
        let Some(raw) = self.store.public_blob_embedding(blob_id).await? else {
            return Ok(Vec::new());
        };
        let source = match decode_embedding(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(blob_id, error = %e, "Source embedding undecodable, no similar items");
                return Ok(Vec::new());
            }
        };

        let candidates = self.store.public_candidates_excluding(blob_id).await?;
        let mut scored: Vec<(f32, PublicBlob)> = Vec::with_capacity(candidates.len());
        for (blob, raw) in candidates {
            let embedding = match decode_embedding(&raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!(blob_id = blob.id, error = %e, "Skipping undecodable embedding");
                    continue;
                }
            };
            if embedding.len() != source.len() {
                continue;
            }
            scored.push((cosine_similarity(&source, &embedding), blob));
        }

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(b.1.id.cmp(&a.1.id))
        });
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, blob)| blob).collect())
    }
}
