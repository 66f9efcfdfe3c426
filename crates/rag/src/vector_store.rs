//! Per-session retrieval index.
//!
//! One index holds the embedded chunks of exactly one document. It is sealed
//! at construction: there is no incremental insert or delete, and rebuilding
//! means discarding the index and constructing a new one.

use rig::OneOrMany;
use rig::vector_store::in_memory_store::InMemoryVectorStore;
use thiserror::Error;

use crate::chunk::Chunk;
use crate::embeddings::{EmbeddingClient, EmbeddingError};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("search error: {0}")]
    Search(String),
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

pub struct ChunkIndex {
    store: InMemoryVectorStore<Chunk>,
    model: rig_fastembed::EmbeddingModel,
    len: usize,
}

impl ChunkIndex {
    /// Embed every chunk and seal the index. Chunks are inserted in the order
    /// given, which is what breaks ties between equal-scoring results.
    pub async fn build(
        embeddings: &EmbeddingClient,
        chunks: Vec<Chunk>,
    ) -> Result<Self, IndexError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embeddings.embed_batch(texts).await?;

        let pairs: Vec<(Chunk, OneOrMany<rig::embeddings::Embedding>)> = chunks
            .into_iter()
            .zip(vectors.into_iter().map(OneOrMany::one))
            .collect();

        let len = pairs.len();
        let mut store = InMemoryVectorStore::from_documents(vec![]);
        store.add_documents(pairs);

        Ok(Self {
            store,
            model: embeddings.model().clone(),
            len,
        })
    }

    /// Return at most `k` chunks nearest to the query text.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        use rig::vector_store::VectorStoreIndex;
        use rig::vector_store::request::VectorSearchRequest;

        let index = self.store.clone().index(self.model.clone());

        let request = VectorSearchRequest::builder()
            .query(query)
            .samples(k as u64)
            .build()
            .map_err(|e| IndexError::Search(e.to_string()))?;

        let results: Vec<(f64, String, Chunk)> = index
            .top_n(request)
            .await
            .map_err(|e| IndexError::Search(e.to_string()))?;

        Ok(results
            .into_iter()
            .map(|(score, _id, chunk)| ScoredChunk { chunk, score })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
