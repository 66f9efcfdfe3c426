//! Session orchestration: upload → extract → index → register, query,
//! delete. The session store is process-wide mutable state; map mutation is
//! serialized behind a RwLock while each request's pipeline runs outside it.

use std::{collections::HashMap, path::Path, sync::Arc};

use ragbox_rag::{
    AnswerBackend, Captioner, ChunkIndex, EmbeddingClient, PdfExtractor,
};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::session::{Session, SessionError};

/// How many chunks retrieval hands to the synthesizer.
pub const DEFAULT_TOP_K: usize = 5;

pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    embeddings: Arc<EmbeddingClient>,
    extractor: PdfExtractor,
    answer_backend: Arc<dyn AnswerBackend>,
}

impl SessionManager {
    pub fn new(
        embeddings: Arc<EmbeddingClient>,
        answer_backend: Arc<dyn AnswerBackend>,
        captioner: Option<Arc<dyn Captioner>>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            embeddings,
            extractor: PdfExtractor::new(captioner),
            answer_backend,
        }
    }

    /// Run the full upload pipeline and register the finished session.
    ///
    /// All work happens before the store is touched, so a failing upload
    /// never leaves a half-registered session; the temp directory is released
    /// by drop on every error path.
    pub async fn create_session(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Arc<Session>, SessionError> {
        if !filename.ends_with(".pdf") {
            return Err(SessionError::InvalidFileType);
        }

        let temp_dir = tempfile::tempdir()
            .map_err(|e| SessionError::Processing(format!("failed to allocate temp dir: {e}")))?;

        let upload_name = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.pdf");
        let pdf_path = temp_dir.path().join(upload_name);
        tokio::fs::write(&pdf_path, bytes)
            .await
            .map_err(|e| SessionError::Processing(format!("failed to store upload: {e}")))?;

        let chunks = self.extractor.extract(&pdf_path, filename).await;
        let chunk_count = chunks.len();

        let index = ChunkIndex::build(&self.embeddings, chunks)
            .await
            .map_err(|e| SessionError::Processing(e.to_string()))?;

        let session_id = generate_session_id();
        let session = Arc::new(Session::new(
            session_id.clone(),
            filename.to_string(),
            chunk_count,
            index,
            temp_dir,
        ));

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), Arc::clone(&session));
        info!(session_id, filename, chunk_count, "created session");

        Ok(session)
    }

    /// Retrieve against the session's index and synthesize an answer.
    pub async fn query(&self, session_id: &str, message: &str) -> Result<String, SessionError> {
        let session = self.get_session(session_id).await?;

        let retrieved = session
            .index
            .search(message, DEFAULT_TOP_K)
            .await
            .map_err(|e| SessionError::Processing(e.to_string()))?;

        Ok(self.answer_backend.answer(message, &retrieved).await)
    }

    /// Remove a session and release its temp resources. A second deletion of
    /// the same id reports `NotFound`; resources are released exactly once.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(session_id) {
            Some(session) => {
                let lived_secs = (chrono::Utc::now() - session.created_at).num_seconds();
                info!(session_id, lived_secs, "deleted session");
                Ok(())
            }
            None => {
                warn!(session_id, "delete for unknown session");
                Err(SessionError::NotFound)
            }
        }
    }

    pub async fn active_session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn get_session(&self, session_id: &str) -> Result<Arc<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or(SessionError::NotFound)
    }
}

pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}
