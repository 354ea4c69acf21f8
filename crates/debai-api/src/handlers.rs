//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors,
//! calls into the chat orchestrator held by AppState, and returns JSON.

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use debai_action::completion::Routing;
use debai_action::types::{ToolDeclaration, ToolKind};
use debai_chat::{FileKind, MemoryStats, TurnState};
use debai_core::types::Turn;

use crate::error::ApiError;
use crate::state::AppState;

/// Session key used when the caller does not name one.
pub const DEFAULT_SESSION: &str = "default";

fn default_session() -> String {
    DEFAULT_SESSION.to_string()
}

/// Trimmed session id, or the default when blank.
fn session_key(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_SESSION
    } else {
        trimmed
    }
}

// =============================================================================
// Request and query parameter types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_session")]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileParams {
    pub filename: String,
    #[serde(default = "default_session")]
    pub session_id: String,
    pub file_type: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub tools: usize,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDeclaration>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub state: TurnState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolKind>,
    /// Every upload held for the session.
    pub uploaded_files: Vec<String>,
    /// Documents generated by this turn.
    pub generated_files: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearHistoryResponse {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MemoryStatsResponse {
    pub session_id: String,
    pub stats: MemoryStats,
    pub context_summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<Turn>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub session_id: String,
    pub query: String,
    pub results: Vec<Turn>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub filename: String,
    pub size: u64,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub session_id: String,
    pub uploaded_files: Vec<String>,
    pub generated_files: Vec<String>,
    pub total_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteFileResponse {
    pub session_id: String,
    pub filename: String,
    pub file_type: FileKind,
    pub message: String,
}

// =============================================================================
// Service endpoints
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.orchestrator.memory().session_count(),
        tools: state.orchestrator.registry().list().len(),
    })
}

/// GET /tools - the tool menu offered to the completion service.
pub async fn tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.orchestrator.registry().list().to_vec(),
    })
}

/// POST /route - tool selection only, no memory and no side effects.
pub async fn route_message(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<RouteResponse>, ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message cannot be empty".to_string()));
    }

    let response = match state.orchestrator.route(message).await? {
        Routing::Tool(choice) => RouteResponse {
            tool: Some(choice.name),
            confidence: Some(choice.confidence),
            reply: None,
        },
        Routing::Reply(text) => RouteResponse {
            tool: None,
            confidence: None,
            reply: Some(text),
        },
    };
    Ok(Json(response))
}

// =============================================================================
// Chat endpoints
// =============================================================================

/// POST /chat - run one turn of the agent loop.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session = session_key(&req.session_id);
    let outcome = state.orchestrator.handle_message(session, &req.message).await?;
    let files = state.orchestrator.files().list(session).await?;

    Ok(Json(ChatResponse {
        response: outcome.reply,
        session_id: session.to_string(),
        state: outcome.state,
        tool: outcome.tool,
        uploaded_files: files.uploaded,
        generated_files: outcome.generated_files,
    }))
}

/// DELETE /chat/history/{session_id} - forget memory and files.
pub async fn clear_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ClearHistoryResponse>, ApiError> {
    let session = session_key(&session_id);
    state.orchestrator.clear_session(session).await?;
    Ok(Json(ClearHistoryResponse {
        session_id: session.to_string(),
        message: "Conversation history and session files cleared".to_string(),
    }))
}

// =============================================================================
// Memory endpoints
// =============================================================================

/// GET /memory/stats/{session_id}
pub async fn memory_stats(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<MemoryStatsResponse> {
    let session = session_key(&session_id);
    let memory = state.orchestrator.memory();
    Json(MemoryStatsResponse {
        session_id: session.to_string(),
        stats: memory.stats(session),
        context_summary: memory.context_summary(session),
        summary: memory.summary(session),
    })
}

/// GET /memory/history/{session_id}?limit=
pub async fn memory_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    let session = session_key(&session_id);
    let limit = params
        .limit
        .unwrap_or(state.config.memory.context_turns)
        .min(state.orchestrator.memory().capacity());
    let turns = state.orchestrator.history(session, limit);
    Json(HistoryResponse {
        session_id: session.to_string(),
        count: turns.len(),
        turns,
    })
}

/// GET /memory/search/{session_id}?q=
pub async fn memory_search(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        return Err(ApiError::BadRequest(
            "Query parameter 'q' is required".to_string(),
        ));
    }
    let session = session_key(&session_id);
    let results = state.orchestrator.memory().search(session, &query);
    Ok(Json(SearchResponse {
        session_id: session.to_string(),
        query,
        count: results.len(),
        results,
    }))
}

// =============================================================================
// File endpoints
// =============================================================================

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// POST /upload-file - multipart with a `file` part and an optional
/// `session_id` part, in either order.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut session_id = default_session();
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("session_id") => {
                session_id = field.text().await.map_err(multipart_error)?;
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::BadRequest("file part has no filename".to_string()))?;
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing 'file' part".to_string()))?;
    let session = session_key(&session_id);
    let stored = state
        .orchestrator
        .files()
        .save_upload(session, &filename, &bytes)
        .await?;

    Ok(Json(UploadResponse {
        session_id: session.to_string(),
        message: format!(
            "Uploaded {}. It will be attached to emails sent in this session.",
            stored.filename
        ),
        filename: stored.filename,
        size: stored.size,
    }))
}

/// GET /list-files/{session_id}
pub async fn list_files(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<FileListResponse>, ApiError> {
    let session = session_key(&session_id);
    let files = state.orchestrator.files().list(session).await?;
    Ok(Json(FileListResponse {
        session_id: session.to_string(),
        total_count: files.total_count(),
        uploaded_files: files.uploaded,
        generated_files: files.generated,
    }))
}

/// DELETE /delete-file?filename=&session_id=&file_type=
pub async fn delete_file(
    State(state): State<AppState>,
    Query(params): Query<DeleteFileParams>,
) -> Result<Json<DeleteFileResponse>, ApiError> {
    let kind = match params.file_type.as_deref() {
        Some(raw) => raw.parse::<FileKind>().map_err(ApiError::BadRequest)?,
        None => FileKind::Uploaded,
    };
    let session = session_key(&params.session_id);
    state
        .orchestrator
        .files()
        .delete(session, &params.filename, kind)
        .await?;

    Ok(Json(DeleteFileResponse {
        session_id: session.to_string(),
        message: format!("Deleted {}", params.filename.trim()),
        filename: params.filename.trim().to_string(),
        file_type: kind,
    }))
}
