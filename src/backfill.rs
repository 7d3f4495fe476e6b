//! Regenerates embeddings for items stored while the provider was
//! unavailable.

use tracing::{info, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::StoreError;
use crate::store::BlobStore;

/// Embed every item currently lacking an embedding and return how many
/// were updated.
///
/// A single item's provider failure is logged and skipped, never aborting
/// the batch; the item simply stays in the missing set for the next run.
/// Safe to run alongside live writers: a row embedded concurrently
/// between the scan and the update is harmlessly re-written,
/// last-write-wins.
pub async fn reprocess_missing(
    store: &BlobStore,
    provider: &dyn EmbeddingProvider,
) -> Result<usize, StoreError> {
    let missing = store.blobs_missing_embedding().await?;
    if missing.is_empty() {
        info!("No blobs need embedding reprocessing");
        return Ok(0);
    }

    info!(count = missing.len(), "Starting embedding backfill");
    let mut updated = 0usize;
    for (blob_id, content, content_type) in missing {
        match provider.embed(&content).await {
            Ok(embedding) if !embedding.is_empty() => {
                if let Err(e) = store.attach_embedding(blob_id, &embedding).await {
                    warn!(blob_id, error = %e, "Failed to attach backfilled embedding");
                    continue;
                }
                updated += 1;
            }
            Ok(_) => {
                warn!(blob_id, content_type, "Provider returned an empty embedding");
            }
            Err(e) => {
                warn!(blob_id, content_type, error = %e, "Embedding generation failed");
            }
        }
    }

    info!(updated, "Embedding backfill complete");
    Ok(updated)
}
