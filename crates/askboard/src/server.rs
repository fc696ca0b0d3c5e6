//! JSON HTTP API for the question board.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`   | `/health` | Health check (returns version) |
//! | `POST`  | `/questions` | Create a question (runs duplicate checks) |
//! | `GET`   | `/questions/{id}` | Fetch a question (counts a view) |
//! | `PATCH` | `/questions/{id}` | Update text, labels, or status |
//! | `DELETE`| `/questions/{id}` | Delete a question and its answers |
//! | `GET`   | `/search` | Ranked similar-question lookup |
//! | `POST`  | `/questions/{id}/answers` | Record an answer |
//! | `POST`  | `/questions/{id}/accept` | Accept an answer, closing the question |
//! | `POST`  | `/questions/{id}/vote` | Toggle the caller's up-vote |
//! | `POST`  | `/questions/{id}/bookmark` | Toggle the caller's bookmark |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "duplicate_exact", "message": "...", "question_id": "..." } }
//! ```
//!
//! Error codes: `validation` (400), `duplicate_exact` (400), `duplicate_near`
//! (400), `not_found` (404), `upstream` (502), `persistence` (500). Duplicate
//! rejections carry the matched `question_id` (and, for `duplicate_near`, the
//! vector and lexical scores) so clients can link to the existing thread.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! course pages.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use askboard_core::error::QaError;
use askboard_core::models::NewQuestion;

use crate::config::Config;
use crate::questions::{QuestionService, UpdateRequest};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    service: Arc<QuestionService>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config, service: Arc<QuestionService>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState { service };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/questions", post(handle_create))
        .route(
            "/questions/{id}",
            get(handle_get).patch(handle_update).delete(handle_delete),
        )
        .route("/search", get(handle_search))
        .route("/questions/{id}/answers", post(handle_answer))
        .route("/questions/{id}/accept", post(handle_accept))
        .route("/questions/{id}/vote", post(handle_vote))
        .route("/questions/{id}/bookmark", post(handle_bookmark))
        .layer(cors)
        .with_state(state);

    println!("askboard server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
/// Duplicate rejections additionally identify the matched question.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    question_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lexical_score: Option<f64>,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    detail: ErrorDetail,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.detail })).into_response()
    }
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        let message = err.to_string();
        let (status, code, question_id, vector_score, lexical_score) = match err {
            QaError::Validation(_) => (StatusCode::BAD_REQUEST, "validation", None, None, None),
            QaError::DuplicateExact { question_id, .. } => (
                StatusCode::BAD_REQUEST,
                "duplicate_exact",
                Some(question_id),
                None,
                None,
            ),
            QaError::DuplicateNear {
                question_id,
                vector_score,
                lexical_score,
                ..
            } => (
                StatusCode::BAD_REQUEST,
                "duplicate_near",
                Some(question_id),
                Some(vector_score),
                Some(lexical_score),
            ),
            QaError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None, None, None),
            QaError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream", None, None, None),
            QaError::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "persistence",
                None,
                None,
                None,
            ),
        };
        AppError {
            status,
            detail: ErrorDetail {
                code: code.to_string(),
                message,
                question_id,
                vector_score,
                lexical_score,
            },
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /questions ============

async fn handle_create(
    State(state): State<AppState>,
    Json(new): Json<NewQuestion>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let question = state.service.create(new).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!(question))))
}

// ============ GET /questions/{id} ============

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let question = state.service.get(&id).await?;
    Ok(Json(serde_json::json!(question)))
}

// ============ PATCH /questions/{id} ============

async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let question = state.service.update(&id, req).await?;
    Ok(Json(serde_json::json!(question)))
}

// ============ DELETE /questions/{id} ============

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    #[serde(default)]
    course_id: Option<String>,
    #[serde(default)]
    k: Option<usize>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let results = state
        .service
        .search(&query.q, query.course_id.as_deref(), query.k)
        .await?;
    Ok(Json(serde_json::json!({ "results": results })))
}

// ============ POST /questions/{id}/answers ============

#[derive(Deserialize)]
struct AnswerRequest {
    author_id: String,
    text: String,
}

async fn handle_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let answer = state
        .service
        .record_answer(&id, &req.author_id, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!(answer))))
}

// ============ POST /questions/{id}/accept ============

#[derive(Deserialize)]
struct AcceptRequest {
    answer_id: String,
}

async fn handle_accept(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AcceptRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let question = state.service.accept_answer(&id, &req.answer_id).await?;
    Ok(Json(serde_json::json!(question)))
}

// ============ POST /questions/{id}/vote ============

/// Membership toggle body shared by vote and bookmark routes. `on`
/// defaults to true so a bare `{"user_id": "..."}` adds the membership.
#[derive(Deserialize)]
struct ToggleRequest {
    user_id: String,
    #[serde(default = "default_on")]
    on: bool,
}

fn default_on() -> bool {
    true
}

async fn handle_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let question = state.service.set_vote(&id, &req.user_id, req.on).await?;
    Ok(Json(serde_json::json!(question)))
}

// ============ POST /questions/{id}/bookmark ============

async fn handle_bookmark(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let question = state.service.set_bookmark(&id, &req.user_id, req.on).await?;
    Ok(Json(serde_json::json!(question)))
}
