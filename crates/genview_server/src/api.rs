//! Routes of the generation endpoint.

use std::io;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use genview_llm::{build_conversation, CompletionBackend, LlmError, TokenStream};
use genview_protocol::{GenerateRequest, StreamRecord, NDJSON_CONTENT_TYPE};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::cleanup::clean_completion;
use crate::config::ServerConfig;

/// Records buffered between the relay task and the response body.
const RELAY_BUFFER: usize = 64;

/// Shared state for the generation endpoint.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn CompletionBackend>,
}

impl AppState {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }
}

/// Build the endpoint router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/api/generate", post(generate))
        .route("/health", get(health))
        .with_state(state);

    if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "genview" }))
}

/// Failures reported before the stream starts.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Upstream(LlmError),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// POST /api/generate: stream a completion as NDJSON records.
async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }

    let mode = request.mode();
    info!(
        %mode,
        transcript = request.messages.len(),
        backend = state.backend.name(),
        "Starting generation"
    );

    let conversation = build_conversation(&request);
    let tokens = state.backend.stream_completion(&conversation).await.map_err(|e| {
        error!("Completion backend refused the request: {}", e);
        ApiError::Upstream(e)
    })?;

    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    tokio::spawn(relay_completion(tokens, tx));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-content-type-options", "nosniff")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

type Chunk = Result<Bytes, io::Error>;

/// Forward every token as a fragment record, then the cleaned record if the
/// output was fenced.
///
/// A backend failure mid-stream is sent as a body error, which aborts the
/// chunked response so the client sees a broken transport rather than a
/// clean end.
async fn relay_completion(mut tokens: TokenStream, tx: mpsc::Sender<Chunk>) {
    let mut raw = String::new();
    let mut fragments = 0usize;

    while let Some(item) = tokens.next().await {
        match item {
            Ok(token) => {
                raw.push_str(&token);
                fragments += 1;
                if send_record(&tx, &StreamRecord::fragment(token)).await.is_err() {
                    debug!("Client disconnected after {} fragments", fragments);
                    return;
                }
            }
            Err(e) => {
                warn!("Completion failed after {} fragments: {}", fragments, e);
                let _ = tx.send(Err(io::Error::other(e.to_string()))).await;
                return;
            }
        }
    }

    if let Some(cleaned) = clean_completion(&raw) {
        debug!("Output contained fences, sending cleaned code");
        if send_record(&tx, &StreamRecord::cleaned(cleaned)).await.is_err() {
            debug!("Client disconnected before the cleaned record");
            return;
        }
    }

    info!(fragments, chars = raw.len(), "Generation complete");
}

async fn send_record(tx: &mpsc::Sender<Chunk>, record: &StreamRecord) -> Result<(), ()> {
    let chunk = record
        .to_line()
        .map(Bytes::from)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
    tx.send(chunk).await.map_err(|_| ())
}
