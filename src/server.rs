//! HTTP boundary exposing the [`Orchestrator`].
//!
//! `POST /generate-image` (and `POST /`) take `{"prompt", "style"}` and answer
//! `{"image"}` or `{"error", "details", "kind"}`. Every response carries
//! permissive CORS headers and `OPTIONS` on any path is an empty 200.

use crate::composer::{ErrorResponse, ImageResponse};
use crate::config::Config;
use crate::error::{PromptCanvasError, Result};
use crate::image::GenerationRequest;
use crate::orchestrator::Orchestrator;
use crate::style::StyleTable;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    provider: &'static str,
    configured: bool,
}

/// Builds the router around an orchestrator.
pub fn router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/", post(generate_image))
        .route("/generate-image", post(generate_image))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .with_state(orchestrator)
}

/// Binds `config.bind` and serves until the process exits.
pub async fn serve(config: &Config) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config, Arc::new(StyleTable::builtin()));
    let app = router(orchestrator);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, provider = %config.provider, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

async fn generate_image(State(orchestrator): State<Orchestrator>, body: Bytes) -> Response {
    // Content-Type is not required; the body is parsed as JSON regardless.
    let request: GenerationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "rejecting malformed body");
            return error_response(&PromptCanvasError::InvalidInput(format!(
                "malformed request body: {e}"
            )));
        }
    };

    match orchestrator.generate(&request).await {
        Ok(generated) => Json(ImageResponse {
            image: generated.image.as_source(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn health(State(orchestrator): State<Orchestrator>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        provider: orchestrator.provider_kind().as_str(),
        configured: orchestrator.is_configured(),
    })
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
            details: None,
            kind: None,
        }),
    )
        .into_response()
}

fn error_response(err: &PromptCanvasError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let details = match err {
        PromptCanvasError::InvalidInput(reason) | PromptCanvasError::NotConfigured(reason) => {
            Some(reason.clone())
        }
        other => other.provider_detail(),
    };
    let body = ErrorResponse {
        error: err.user_message().to_string(),
        details,
        kind: Some(err.kind()),
    };

    let mut response = (status, Json(body)).into_response();
    if let Some(retry_after) = err.retry_after().filter(|_| status == StatusCode::TOO_MANY_REQUESTS)
    {
        if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}
