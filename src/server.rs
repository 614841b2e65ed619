//! JSON HTTP API.
//!
//! Exposes the analysis, search, and chat surfaces for frontends. The web
//! UI itself lives elsewhere; this layer only speaks JSON.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/analyze` | Analyze a case description against the corpus |
//! | `POST` | `/search` | Similarity search (mode `cases`, `chunks`, or `grouped`) |
//! | `POST` | `/chat/start` | Create a chat session for a case |
//! | `POST` | `/chat/send` | Send a message in a session |
//! | `DELETE` | `/chat/:id` | Terminate a session |
//! | `GET` | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "validation_failed", "message": "length, xss" } }
//! ```
//!
//! Validation rejections carry violation categories only; the matched
//! pattern is never echoed back.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::analysis::{CaseAnalysis, CaseAnalyzer};
use crate::chat::{ChatEngine, ChatResponse};
use crate::config::Config;
use crate::error::Error;
use crate::models::{CaseMatch, GroupedCase, RetrievalHit};
use crate::similarity::SimilarityEngine;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<CaseAnalyzer>,
    pub similarity: Arc<SimilarityEngine>,
    pub chat: Arc<ChatEngine>,
    pub config: Arc<Config>,
}

/// Start the HTTP server on the configured bind address.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/analyze", post(handle_analyze))
        .route("/search", post(handle_search))
        .route("/chat/start", post(handle_chat_start))
        .route("/chat/send", post(handle_chat_send))
        .route("/chat/:id", delete(handle_chat_delete))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!(addr = %bind_addr, "server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::ValidationFailed { .. } | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::SessionTerminated(_) => StatusCode::GONE,
            Error::IndexNotReady => StatusCode::SERVICE_UNAVAILABLE,
            Error::LlmUnavailable(_) | Error::EmbeddingUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // ValidationFailed's display already reduces to category labels.
        AppError {
            status,
            code: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ POST /analyze ============

#[derive(Deserialize)]
struct AnalyzeRequest {
    case_text: String,
    #[serde(default = "default_k")]
    k: usize,
    #[serde(default)]
    user_id: Option<String>,
}

fn default_k() -> usize {
    5
}

async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<CaseAnalysis>, AppError> {
    if req.case_text.trim().is_empty() {
        return Err(bad_request("case_text must not be empty"));
    }
    if req.k == 0 || req.k > 20 {
        return Err(bad_request("k must be between 1 and 20"));
    }

    let result = state
        .analyzer
        .analyze_text(&req.case_text, req.k, req.user_id.as_deref())
        .await?;
    Ok(Json(result))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    /// `"cases"` (deduplicated), `"chunks"` (raw), or `"grouped"`.
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default = "default_k")]
    k: usize,
    #[serde(default = "default_chunks_per_case")]
    max_chunks_per_case: usize,
}

fn default_mode() -> String {
    "cases".to_string()
}

fn default_chunks_per_case() -> usize {
    3
}

#[derive(Serialize)]
#[serde(untagged)]
enum SearchResponse {
    Cases { results: Vec<CaseMatch> },
    Chunks { results: Vec<RetrievalHit> },
    Grouped { results: Vec<GroupedCase> },
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let response = match req.mode.as_str() {
        "cases" => SearchResponse::Cases {
            results: state.similarity.find_similar_cases(&req.query, req.k).await?,
        },
        "chunks" => SearchResponse::Chunks {
            results: state
                .similarity
                .find_similar_chunks(&req.query, req.k)
                .await?,
        },
        "grouped" => SearchResponse::Grouped {
            results: state
                .similarity
                .find_grouped(&req.query, req.k, req.max_chunks_per_case)
                .await?,
        },
        other => {
            return Err(bad_request(format!(
                "Unknown search mode: {}. Use cases, chunks, or grouped.",
                other
            )))
        }
    };

    Ok(Json(response))
}

// ============ POST /chat/start ============

#[derive(Deserialize)]
struct ChatStartRequest {
    user_id: String,
    case_text: String,
    #[serde(default)]
    case_title: String,
}

#[derive(Serialize)]
struct ChatStartResponse {
    session_id: String,
}

async fn handle_chat_start(
    State(state): State<AppState>,
    Json(req): Json<ChatStartRequest>,
) -> Result<Json<ChatStartResponse>, AppError> {
    if req.user_id.trim().is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }

    let session_id = state
        .chat
        .start_session(&req.user_id, &req.case_text, &req.case_title)
        .await?;
    Ok(Json(ChatStartResponse { session_id }))
}

// ============ POST /chat/send ============

#[derive(Deserialize)]
struct ChatSendRequest {
    session_id: String,
    message: String,
    #[serde(default = "default_use_rag")]
    use_rag: bool,
}

fn default_use_rag() -> bool {
    true
}

async fn handle_chat_send(
    State(state): State<AppState>,
    Json(req): Json<ChatSendRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let response = state
        .chat
        .send_message(&req.session_id, &req.message, req.use_rag)
        .await?;
    Ok(Json(response))
}

// ============ DELETE /chat/:id ============

#[derive(Deserialize)]
struct ChatDeleteRequest {
    user_id: String,
}

async fn handle_chat_delete(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<ChatDeleteRequest>,
) -> Result<StatusCode, AppError> {
    state.chat.delete_session(&session_id, &req.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    corpus_chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        corpus_chunks: state.similarity.retriever().corpus_size(),
    })
}
