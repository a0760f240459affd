//! HTTP server for interactive previews.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                              |
//! |--------|-------------------|------------------------------------------|
//! | GET    | `/health`         | Health check                             |
//! | POST   | `/api/preview`    | Match + transform two uploaded CSVs      |
//! | GET    | `/api/logs`       | SSE stream for real-time logs            |
//!
//! `/api/preview` takes a multipart form with the fields `source` and
//! `target` (CSV files), `rules` (rule-set JSON) and an optional `limit`
//! (number of rows to return).

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::types::{error_response, PreviewResponse};
use crate::config::AppConfig;
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::logging::{log_error, log_info, LOG_BROADCASTER};
use crate::pipeline::run_bytes;
use crate::rules::RuleSet;

type ApiError = (StatusCode, Json<Value>);

/// Raw contents of a preview upload.
#[derive(Debug, Clone, Default)]
pub struct PreviewRequest {
    pub source: Option<Vec<u8>>,
    pub target: Option<Vec<u8>>,
    pub rules: Option<String>,
    pub limit: Option<usize>,
}

/// Build the application router.
pub fn router(config: AppConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let body_limit = config.max_upload_bytes;

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/preview", post(preview))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(config)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.port;
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log_info(format!("🚀 tabmatch server running on http://localhost:{}", port));
    log_info("   POST /api/preview - Match and transform two CSV files");
    log_info("   GET  /api/logs    - SSE log stream");
    log_info("   GET  /health      - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tabmatch",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "preview": "POST /api/preview",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // lagged receivers just skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn preview(State(config): State<AppConfig>, multipart: Multipart) -> Result<Json<PreviewResponse>, ApiError> {
    let request = read_preview_form(multipart).await.map_err(api_error)?;
    let default_limit = config.preview_rows;

    let response = tokio::task::spawn_blocking(move || run_preview(request, default_limit))
        .await
        .map_err(|e| api_error(ServerError::Internal(e.to_string())))?
        .map_err(api_error)?;

    Ok(Json(response))
}

async fn read_preview_form(mut multipart: Multipart) -> ServerResult<PreviewRequest> {
    let mut request = PreviewRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error on '{}': {}", name, e)))?;

        match name.as_str() {
            "source" => request.source = Some(bytes.to_vec()),
            "target" => request.target = Some(bytes.to_vec()),
            "rules" => {
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|_| ServerError::BadRequest("'rules' is not valid UTF-8".to_string()))?;
                request.rules = Some(text);
            }
            "limit" => {
                let text = String::from_utf8_lossy(&bytes);
                let limit = text
                    .trim()
                    .parse()
                    .map_err(|_| ServerError::BadRequest(format!("'limit' must be a row count, got '{}'", text)))?;
                request.limit = Some(limit);
            }
            _ => {}
        }
    }

    Ok(request)
}

/// Run the pipeline for one preview request.
pub fn run_preview(request: PreviewRequest, default_limit: usize) -> ServerResult<PreviewResponse> {
    let source = request
        .source
        .ok_or_else(|| ServerError::BadRequest("No source file provided".to_string()))?;
    let target = request
        .target
        .ok_or_else(|| ServerError::BadRequest("No target file provided".to_string()))?;
    let rules_json = request
        .rules
        .ok_or_else(|| ServerError::BadRequest("No rules provided".to_string()))?;

    log_info(format!(
        "📄 New preview: source {} bytes, target {} bytes",
        source.len(),
        target.len()
    ));

    let rules = RuleSet::from_json(&rules_json).map_err(PipelineError::from)?;
    let output = run_bytes(&source, &target, &rules)?;

    Ok(PreviewResponse::from_output(output, request.limit.unwrap_or(default_limit)))
}

fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Export(_)) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServerError::Pipeline(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn api_error(err: ServerError) -> ApiError {
    let status = status_for(&err);
    log_error(format!("Preview failed: {}", err));
    (status, Json(error_response(&err.to_string())))
}
