//! HTTP server exposing the four pipelines as a JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/recognize` | Nearest-neighbor place/person recognition |
//! | `POST` | `/translate` | Hieroglyph classification + translation |
//! | `POST` | `/chat` | Domain-restricted chat with per-session memory |
//! | `POST` | `/plan` | Retrieval-grounded itinerary generation |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Images travel as base64 strings inside the JSON bodies. Each chat
//! session owns its bounded conversation memory, keyed by the `session`
//! id the server hands out on the first request — there is no shared
//! global history.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "decode_error", "message": "failed to decode image: ..." } }
//! ```
//!
//! Client-caused failures (`bad_request`, `decode_error`) map to 400,
//! `schema_violation` to 422, and service-caused failures
//! (`encoder_error`, `classifier_error`, `generation_error`,
//! `artifact_error`) to 500.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};

use crate::app::AppContext;
use crate::chat::chat;
use crate::error::CoreError;
use crate::memory::ConversationMemory;
use crate::models::{
    ChatRequest, Domain, PlanRequest, RecognizeRequest, RecognizeResponse, TranslateRequest,
    TranslateResponse,
};
use crate::plan::plan_trip;
use crate::recognize::recognize;
use crate::translate::translate;

/// One conversation memory per session id. The outer lock is only held
/// to look up or insert a session; the per-session lock is held across
/// the chat pipeline so turns from one session never interleave.
type SessionMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<ConversationMemory>>>>;

/// Shared state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    ctx: Arc<AppContext>,
    sessions: Arc<SessionMap>,
}

/// Start the server on the address configured in `[server].bind`. Runs
/// until the process is terminated.
pub async fn run_server(ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();

    let state = AppState {
        ctx,
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/recognize", post(handle_recognize))
        .route("/translate", post(handle_translate))
        .route("/chat", post(handle_chat))
        .route("/plan", post(handle_plan))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("kemet server listening on http://{}", bind_addr);

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

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"decode_error"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let (status, code) = match &err {
            CoreError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            CoreError::Decode(_) => (StatusCode::BAD_REQUEST, "decode_error"),
            CoreError::SchemaViolation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "schema_violation"),
            CoreError::Encoder(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encoder_error"),
            CoreError::Classifier(_) => (StatusCode::INTERNAL_SERVER_ERROR, "classifier_error"),
            CoreError::Generation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "generation_error"),
            CoreError::Artifact(_) => (StatusCode::INTERNAL_SERVER_ERROR, "artifact_error"),
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
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

/// Decode one base64-wrapped image field.
fn decode_image(field: &str, encoded: &str) -> Result<Vec<u8>, AppError> {
    BASE64
        .decode(encoded.trim())
        .map_err(|e| bad_request(format!("{} is not valid base64: {}", field, e)))
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

// ============ POST /recognize ============

#[derive(Deserialize)]
struct RecognizeBody {
    /// `place` or `person`.
    domain: String,
    /// Base64-encoded image bytes.
    image: String,
}

async fn handle_recognize(
    State(state): State<AppState>,
    Json(body): Json<RecognizeBody>,
) -> Result<Json<RecognizeResponse>, AppError> {
    let request = RecognizeRequest {
        domain: Domain::parse(&body.domain)?,
        image: decode_image("image", &body.image)?,
    };
    let response = recognize(&state.ctx, request).await?;
    Ok(Json(response))
}

// ============ POST /translate ============

#[derive(Deserialize)]
struct TranslateBody {
    /// Base64-encoded symbol images, in reading order.
    images: Vec<String>,
}

async fn handle_translate(
    State(state): State<AppState>,
    Json(body): Json<TranslateBody>,
) -> Result<Json<TranslateResponse>, AppError> {
    let mut images = Vec::with_capacity(body.images.len());
    for (i, encoded) in body.images.iter().enumerate() {
        images.push(decode_image(&format!("images[{}]", i), encoded)?);
    }
    let response = translate(&state.ctx, TranslateRequest { images }).await?;
    Ok(Json(response))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatBody {
    question: String,
    #[serde(default)]
    context: Option<String>,
    /// Session id from a previous response; omitted on the first turn.
    #[serde(default)]
    session: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    session: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>, AppError> {
    let session = body
        .session
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let memory = {
        let mut sessions = state.sessions.lock().expect("session map poisoned");
        sessions
            .entry(session.clone())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(ConversationMemory::new(
                    state.ctx.config.chat.memory_capacity,
                )))
            })
            .clone()
    };

    let mut memory = memory.lock().await;
    let response = chat(
        &state.ctx,
        &mut memory,
        ChatRequest {
            question: body.question,
            context: body.context,
        },
    )
    .await?;

    Ok(Json(ChatResponse { response, session }))
}

// ============ POST /plan ============

#[derive(Serialize)]
struct PlanResponse {
    itinerary: crate::models::Itinerary,
}

async fn handle_plan(
    State(state): State<AppState>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    let itinerary = plan_trip(&state.ctx, request).await?;
    Ok(Json(PlanResponse { itinerary }))
}
