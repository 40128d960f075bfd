//! HTTP gateway
//!
//! Exposes the runtime over an OpenAI-compatible API plus health and
//! status probes. Handlers carry no orchestration logic; every turn goes
//! through the runtime's orchestrator.

pub mod openai;

use crate::config::ApiConfig;
use crate::error::{AgentdError, Result};
use crate::runtime::AgentRuntime;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

/// Shared handler state
pub type AppState = Arc<AgentRuntime>;

/// Error rendered as `{"error": {"message": ...}}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Error for a request body that could not be decoded
    pub fn bad_request(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {}", self.message);
        }
        (
            self.status,
            Json(json!({ "error": { "message": self.message } })),
        )
            .into_response()
    }
}

/// Build the gateway router
pub fn router(runtime: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/api/show", post(show))
        .route("/v1/models", get(openai::list_models))
        .route("/v1/chat/completions", post(openai::chat_completions))
        .fallback(not_found)
        .layer(middleware::from_fn(log_requests))
        .with_state(runtime)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// Echo the request body, `{}` when absent or not JSON
async fn show(body: Option<Json<serde_json::Value>>) -> Json<serde_json::Value> {
    let echo = body.map(|Json(value)| value).unwrap_or_else(|| json!({}));
    Json(json!({ "ok": true, "echo": echo }))
}

async fn status(State(runtime): State<AppState>) -> impl IntoResponse {
    Json(runtime.status())
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": { "message": "Not Found", "path": uri.path() } })),
    )
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let session = request
        .headers()
        .get(openai::SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        "{} {} {} {:?}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    if let Some(session) = session {
        tracing::debug!("{} {} session header: {}", method, path, session);
    }
    response
}

/// Bind the configured address and serve until Ctrl-C
///
/// # Errors
///
/// Returns error if the address cannot be bound or the server fails
pub async fn serve(runtime: AppState) -> Result<()> {
    let listener = bind(&runtime.config().api).await?;
    serve_with_shutdown(runtime, listener, shutdown_signal()).await
}

/// Bind the gateway address from `api`
///
/// # Errors
///
/// Returns a configuration error if the address cannot be bound
pub async fn bind(api: &ApiConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", api.host, api.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AgentdError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("API listening on http://{}", listener.local_addr()?);
    Ok(listener)
}

/// Serve on an already bound listener until `signal` resolves
///
/// # Errors
///
/// Returns error if the server fails
pub async fn serve_with_shutdown<F>(runtime: AppState, listener: TcpListener, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(runtime))
        .with_graceful_shutdown(signal)
        .await?;
    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
