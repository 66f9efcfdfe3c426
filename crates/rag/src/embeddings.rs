use rig::embeddings::{Embedding, embedding::EmbeddingModelDyn};
use rig_fastembed::{Client, EmbeddingModel, FastembedModel};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to initialize embedding model: {0}")]
    Initialization(String),

    #[error("failed to embed text: {0}")]
    Generation(String),
}

/// Deterministic local embedding model shared by index construction and
/// query-time lookups. Both sides must use the same model or similarity
/// scores are meaningless.
pub struct EmbeddingClient {
    model: EmbeddingModel,
}

impl EmbeddingClient {
    pub async fn new() -> Result<Self, EmbeddingError> {
        let client = Client::new();
        let model = client.embedding_model(&FastembedModel::BGEBaseENV15);

        Ok(Self { model })
    }

    pub async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.model
            .embed_text(text)
            .await
            .map_err(|e| EmbeddingError::Generation(e.to_string()))
    }

    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            embeddings.push(self.embed(&text).await?);
        }

        Ok(embeddings)
    }

    pub fn embedding_dim(&self) -> usize {
        768
    }

    pub fn model(&self) -> &EmbeddingModel {
        &self.model
    }
}
