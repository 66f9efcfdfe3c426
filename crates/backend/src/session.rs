use std::path::Path;

use chrono::{DateTime, Utc};
use ragbox_rag::ChunkIndex;
use tempfile::TempDir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Only PDF files are allowed")]
    InvalidFileType,

    #[error("Session not found")]
    NotFound,

    #[error("{0}")]
    Processing(String),
}

/// One uploaded document's retrieval context. Created whole on upload,
/// replace-only, and destroyed on explicit deletion or process shutdown.
/// Dropping the session releases its temp directory.
pub struct Session {
    pub id: String,
    pub filename: String,
    pub chunk_count: usize,
    pub index: ChunkIndex,
    pub created_at: DateTime<Utc>,
    temp_dir: TempDir,
}

impl Session {
    pub fn new(
        id: String,
        filename: String,
        chunk_count: usize,
        index: ChunkIndex,
        temp_dir: TempDir,
    ) -> Self {
        Self {
            id,
            filename,
            chunk_count,
            index,
            created_at: Utc::now(),
            temp_dir,
        }
    }

    /// Location of the session's temporary resources (the uploaded file).
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }
}
