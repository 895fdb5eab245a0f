//! HTTP server for the regex-assist API.
//!
//! # API Endpoints
//!
//! | Method | Path            | Description                                  |
//! |--------|-----------------|----------------------------------------------|
//! | GET    | `/health`       | Health check                                 |
//! | POST   | `/api/upload`   | Parse an uploaded file into a table          |
//! | POST   | `/api/apply`    | Apply an instruction, return processed table |
//! | POST   | `/api/pattern`  | Infer a pattern from a prompt and sample     |
//! | POST   | `/api/preview`  | Transformed sample for a pattern             |
//! | GET    | `/api/logs`     | SSE stream for real-time logs                |

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderName, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::{error_response, ApplyResponse, PreviewBody, UploadResponse};
use crate::client::{PatternRequest, TransformClient};
use crate::config::{Settings, MATCH_STATS_HEADER, REGEX_INFO_HEADER};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::models::{PatternDescriptor, PreviewResult};
use crate::parser::UploadedFile;
use crate::pipeline;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared handler state.
pub struct AppState {
    pub client: TransformClient,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, PipelineError> {
        let client = TransformClient::new(&settings)?;
        Ok(Self { client, settings })
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static("x-regex-info"),
            HeaderName::from_static("x-match-stats"),
        ]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/apply", post(apply))
        .route("/api/pattern", post(pattern))
        .route("/api/preview", post(preview))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let port = settings.port;
    let state = Arc::new(AppState::new(settings)?);
    let app = router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, api_base = %state.settings.api_base, "regex-assist server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// HTTP status for an error: client faults 400, upstream faults 502.
fn status_for(error: &ServerError) -> StatusCode {
    match error {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Parse(_) | PipelineError::EmptyPrompt) => {
            StatusCode::BAD_REQUEST
        }
        ServerError::Pipeline(PipelineError::Remote(_)) => StatusCode::BAD_GATEWAY,
        ServerError::Pipeline(PipelineError::Task(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = status_for(&self);

        if status.is_server_error() {
            log_error(self.to_string());
        } else {
            tracing::info!(error = %self, "rejected request");
        }

        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "regex-assist",
        "version": env!("CARGO_PKG_VERSION"),
        "sideChannel": [REGEX_INFO_HEADER, MATCH_STATS_HEADER],
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Multipart `file` and `prompt` fields.
struct UploadForm {
    file: Option<UploadedFile>,
    prompt: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> ServerResult<UploadForm> {
    let mut form = UploadForm {
        file: None,
        prompt: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let name = field.file_name().unwrap_or("upload.csv").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {e}")))?;
                form.file = Some(UploadedFile::new(name, bytes.to_vec()));
            }
            "prompt" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {e}")))?;
                form.prompt = Some(text);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Parse an uploaded file
async fn upload(multipart: Multipart) -> ServerResult<Json<UploadResponse>> {
    let file = read_form(multipart)
        .await?
        .file
        .ok_or_else(|| ServerError::BadRequest("No file uploaded".into()))?;

    let (file, table) = pipeline::load_original_blocking(file).await?;
    Ok(Json(UploadResponse::new(file.name, table)))
}

/// Apply an instruction to an uploaded file
async fn apply(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ServerResult<Json<ApplyResponse>> {
    let form = read_form(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| ServerError::BadRequest("No file uploaded".into()))?;
    let prompt = form.prompt.unwrap_or_default();

    let outcome = pipeline::apply_prompt(&state.client, &file, &prompt).await?;
    Ok(Json(outcome.into()))
}

/// Infer a pattern
async fn pattern(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PatternRequest>,
) -> ServerResult<Json<PatternDescriptor>> {
    if request.prompt.trim().is_empty() {
        return Err(PipelineError::EmptyPrompt.into());
    }
    let descriptor = state
        .client
        .send_pattern_request(&request)
        .await
        .map_err(PipelineError::from)?;
    Ok(Json(descriptor))
}

/// Transformed sample for a pattern
async fn preview(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PreviewBody>,
) -> ServerResult<Json<PreviewResult>> {
    let result = pipeline::preview(&state.client, &body.file_id, &body.descriptor).await?;
    Ok(Json(result))
}
