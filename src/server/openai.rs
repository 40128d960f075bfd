//! OpenAI-compatible chat endpoints

use crate::agent::{TurnEvent, TurnRecord};
use crate::providers::{Message, Role};
use crate::server::{ApiError, AppState};
use crate::tools::ToolDescriptor;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use uuid::Uuid;

/// Header carrying the session id when the body has none
pub const SESSION_HEADER: &str = "x-session-id";

/// Body of `POST /v1/chat/completions`
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    /// Conversation messages
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Tools the caller declares
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    /// Reply as server-sent events
    #[serde(default)]
    pub stream: bool,
    /// Session to run against, wins over the header
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Non-streaming completion response
#[derive(Debug, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChoiceMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ChoiceMessage {
    pub role: Role,
    pub content: String,
}

/// Token usage, always zero
#[derive(Debug, Default, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4())
}

fn model_name(runtime: &AppState) -> String {
    runtime
        .provider()
        .get_current_model()
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Body session id if non-empty, else the header value
fn resolve_session(body: Option<String>, headers: &HeaderMap) -> Option<String> {
    body.filter(|id| !id.is_empty()).or_else(|| {
        headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    })
}

/// `GET /v1/models`
pub async fn list_models(State(runtime): State<AppState>) -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{
            "id": model_name(&runtime),
            "object": "model",
            "created": chrono::Utc::now().timestamp(),
            "owned_by": "system",
        }],
    }))
}

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    State(runtime): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(ApiError::bad_request)?;
    let session_id = resolve_session(request.session_id, &headers);
    tracing::debug!(
        "Chat completion: session={:?} stream={} messages={} tools={}",
        session_id,
        request.stream,
        request.messages.len(),
        request.tools.len()
    );

    if request.stream {
        return Ok(stream_completion(runtime, session_id, request.messages, request.tools));
    }

    let reply = runtime
        .chat(session_id.as_deref(), &request.messages, &request.tools)
        .await?;

    let completion = ChatCompletion {
        id: completion_id(),
        object: "chat.completion",
        created: chrono::Utc::now().timestamp(),
        model: model_name(&runtime),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: Role::Assistant,
                content: reply.content,
            },
            finish_reason: "stop",
        }],
        usage: Usage::default(),
        session_id: reply.session_id,
    };
    Ok(Json(completion).into_response())
}

fn stream_completion(
    runtime: AppState,
    session_id: Option<String>,
    messages: Vec<Message>,
    tools: Vec<ToolDescriptor>,
) -> Response {
    let model = model_name(&runtime);
    let events = runtime
        .orchestrator()
        .chat_stream(session_id, messages, tools)
        .flat_map(move |event| {
            let frames = match event {
                Ok(TurnEvent::Started { .. }) => vec![data(opening_chunk(&model))],
                Ok(TurnEvent::Delta(text)) => vec![data(delta_chunk(&text))],
                Ok(TurnEvent::Finished(record)) => {
                    vec![data(final_chunk(&record)), Event::default().data("[DONE]")]
                }
                Err(e) => vec![data(json!({ "error": { "message": e.to_string() } }))],
            };
            futures::stream::iter(frames.into_iter().map(Ok::<_, Infallible>))
        });

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events),
    )
        .into_response()
}

fn data(value: Value) -> Event {
    Event::default().data(value.to_string())
}

fn opening_chunk(model: &str) -> Value {
    json!({
        "id": completion_id(),
        "object": "chat.completion.chunk",
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": [],
    })
}

fn delta_chunk(text: &str) -> Value {
    json!({
        "object": "chat.completion.chunk",
        "choices": [{ "delta": { "content": text } }],
    })
}

fn final_chunk(record: &TurnRecord) -> Value {
    json!({
        "object": "chat.completion",
        "choices": [{
            "message": { "role": "assistant", "content": record.content },
            "finish_reason": "stop",
        }],
        "session_id": record.session_id,
    })
}
