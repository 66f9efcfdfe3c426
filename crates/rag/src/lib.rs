pub mod caption;
pub mod chunk;
pub mod chunker;
pub mod embeddings;
pub mod extract;
pub mod synthesizer;
pub mod vector_store;

pub use caption::{CaptionError, Captioner, HttpCaptioner};
pub use chunk::{Chunk, ChunkKind, ChunkMetadata};
pub use embeddings::{EmbeddingClient, EmbeddingError};
pub use extract::PdfExtractor;
pub use synthesizer::{AnswerBackend, LlmSynthesizer};
pub use vector_store::{ChunkIndex, IndexError, ScoredChunk};
