//! Test infrastructure: scripted embedding provider and store fixtures.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::store::BlobStore;

/// Deterministic mock provider. Scripted texts return their configured
/// vectors, texts in the failure set error, and everything else gets a
/// stable content-derived fallback so similarity stays meaningful
/// without loading a real model.
pub struct MockEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fail_on: HashSet<String>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            fail_on: HashSet::new(),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on.insert(text.to_string());
        self
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if self.fail_on.contains(text) {
            anyhow::bail!("scripted embedding failure for {text:?}");
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| fallback_vector(text)))
    }
}

fn fallback_vector(text: &str) -> Vec<f32> {
    let mut acc = [0f32; 4];
    for (i, b) in text.bytes().enumerate() {
        acc[i % 4] += b as f32;
    }
    let norm = acc.iter().map(|x| x * x).sum::<f32>().sqrt().max(1.0);
    acc.iter().map(|x| x / norm).collect()
}

/// A store on a fresh temp-dir database. Keep the TempDir alive for the
/// duration of the test.
pub async fn open_test_store() -> (BlobStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::open(dir.path().join("blob_data.db"))
        .await
        .unwrap();
    (store, dir)
}

/// Opt-in tracing output while debugging a failing test run.
#[allow(dead_code)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
