use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use ragbox_backend::{
    SessionError, SessionManager,
    types::{ChatRequest, ChatResponse, DeleteResponse, HealthResponse, UploadResponse},
};

pub type SharedSessionManager = Arc<SessionManager>;

/// Uploads above this size are refused outright.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn create_router(session_manager: SharedSessionManager) -> Router {
    Router::new()
        .route("/api/health", get(health_endpoint))
        .route("/api/upload", post(upload_endpoint))
        .route("/api/chat", post(chat_endpoint))
        .route("/api/session/:session_id", delete(delete_session_endpoint))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(session_manager)
}

/// Error body shape shared by every endpoint: `{"detail": ...}`.
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> &str {
        match self {
            ApiError::BadRequest(detail)
            | ApiError::NotFound(detail)
            | ApiError::Internal(detail) => detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Returns the first N words of a string for logging preview
fn first_n_words(s: &str, n: usize) -> String {
    s.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

async fn health_endpoint(
    State(session_manager): State<SharedSessionManager>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        active_sessions: session_manager.active_session_count().await,
    })
}

async fn upload_endpoint(
    State(session_manager): State<SharedSessionManager>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read uploaded file: {e}")))?;
        upload = Some((filename, data.to_vec()));
        break;
    }

    let Some((filename, data)) = upload else {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    };

    info!(filename, bytes = data.len(), "POST /api/upload");

    let session = session_manager
        .create_session(&filename, &data)
        .await
        .map_err(|e| match e {
            SessionError::InvalidFileType => ApiError::BadRequest(e.to_string()),
            other => {
                error!(error = %other, filename, "upload processing failed");
                ApiError::Internal(format!("Error processing document: {other}"))
            }
        })?;

    Ok(Json(UploadResponse {
        session_id: session.id.clone(),
        filename: session.filename.clone(),
        chunks_processed: session.chunk_count,
        message: "Document processed successfully".to_string(),
    }))
}

async fn chat_endpoint(
    State(session_manager): State<SharedSessionManager>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let preview = first_n_words(&request.message, 3);
    info!(session_id = request.session_id, preview, "POST /api/chat");

    let response = session_manager
        .query(&request.session_id, &request.message)
        .await
        .map_err(|e| match e {
            SessionError::NotFound => ApiError::NotFound(e.to_string()),
            other => {
                error!(error = %other, session_id = request.session_id, "query failed");
                ApiError::Internal(format!("Error processing query: {other}"))
            }
        })?;

    Ok(Json(ChatResponse {
        response,
        session_id: request.session_id,
    }))
}

async fn delete_session_endpoint(
    State(session_manager): State<SharedSessionManager>,
    Path(session_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    info!(session_id, "DELETE /api/session");

    session_manager
        .delete_session(&session_id)
        .await
        .map_err(|e| ApiError::NotFound(e.to_string()))?;

    Ok(Json(DeleteResponse {
        message: "Session deleted successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_their_status_codes() {
        assert_eq!(
            ApiError::BadRequest("Only PDF files are allowed".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("Session not found".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn first_n_words_truncates_previews() {
        assert_eq!(first_n_words("what does the document say", 3), "what does the");
        assert_eq!(first_n_words("short", 3), "short");
    }
}
