//! Local embedding model, loaded lazily on first use.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::OnceCell;
use tokio::task;
use tracing::info;

use super::EmbeddingProvider;

/// Default provider backed by a local sentence-transformer model. The
/// model download/load happens on the first embedding request, on a
/// blocking thread so the async runtime is never stalled.
#[derive(Clone)]
pub struct LocalEmbedder {
    model: Arc<OnceCell<Arc<TextEmbedding>>>,
}

impl LocalEmbedder {
    pub fn new() -> Self {
        Self {
            model: Arc::new(OnceCell::new()),
        }
    }

    async fn get_model(&self) -> anyhow::Result<Arc<TextEmbedding>> {
        let model = self
            .model
            .get_or_try_init(|| async {
                task::spawn_blocking(|| {
                    let mut options = InitOptions::default();
                    options.model_name = EmbeddingModel::AllMiniLML6V2;
                    options.show_download_progress = false;
                    let model = TextEmbedding::try_new(options)?;
                    info!("Embedding model loaded (AllMiniLML6V2)");
                    Ok::<_, anyhow::Error>(Arc::new(model))
                })
                .await?
            })
            .await?;
        Ok(model.clone())
    }
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let model = self.get_model().await?;
        let text = text.to_string();
        task::spawn_blocking(move || {
            let mut embeddings = model.embed(vec![text], None)?;
            Ok(embeddings.remove(0))
        })
        .await?
    }
}
