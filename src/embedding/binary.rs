//! Binary encoding/decoding for f32 embedding vectors.
//!
//! Embeddings persist as flat little-endian f32 bytes. The store does not
//! pin a dimensionality at write time; search validates each candidate's
//! shape against the query vector instead, so a corrupted or mixed-model
//! row degrades to a skipped candidate rather than a failed query.

use anyhow::{bail, Result};

/// Encode an f32 embedding vector as flat little-endian bytes.
pub fn encode_embedding(vec: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(vec.len() * 4);
    for &val in vec {
        buf.extend_from_slice(&val.to_le_bytes());
    }
    buf
}

/// Decode an embedding blob. Empty or misaligned blobs are an error.
pub fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.is_empty() {
        bail!("empty embedding blob");
    }
    if blob.len() % 4 != 0 {
        bail!("malformed embedding blob: {} bytes", blob.len());
    }
    let mut vec = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        vec.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(vec)
}
