//! HTTP surface.
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `POST` | `/api/v1/search` | `{ "prompt": "..." }` | `{ "code": 200, "message": "Success", "data": { "question", "answer" } }` |
//! | `GET` | `/health` | | `{ "status": "ok", "version" }` |
//!
//! Failures use the body `{ "error": { "code", "message" } }` where `code`
//! names the pipeline stage that failed.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::pipeline::Pipeline;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config, true).await?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;

    println!("listening on http://{}", config.server.bind);
    tracing::info!(bind = %config.server.bind, strategy = ?pipeline.strategy(), "server started");

    axum::serve(listener, router(Arc::new(pipeline))).await?;
    Ok(())
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/search", post(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { pipeline })
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<similarity_core::Error> for AppError {
    fn from(err: similarity_core::Error) -> Self {
        let status = match err.stage() {
            "scorer" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        AppError {
            status,
            code: format!("{}_failed", err.stage()),
            message: err.to_string(),
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

// ============ POST /api/v1/search ============

#[derive(Deserialize)]
struct SearchRequest {
    prompt: String,
}

#[derive(Serialize)]
struct SearchResponse {
    code: u16,
    message: String,
    data: SearchData,
}

#[derive(Serialize)]
struct SearchData {
    question: String,
    answer: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(bad_request("prompt must not be empty"));
    }

    let answer = state.pipeline.answer(&req.prompt).await.map_err(|e| {
        tracing::warn!(stage = e.stage(), error = %e, "search request failed");
        AppError::from(e)
    })?;

    Ok(Json(SearchResponse {
        code: StatusCode::OK.as_u16(),
        message: "Success".to_string(),
        data: SearchData {
            question: answer.question,
            answer: answer.answer,
        },
    }))
}
