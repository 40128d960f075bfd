//! Ollama provider implementation for agentd
//!
//! This module implements the Provider trait for Ollama, connecting to a local
//! or remote Ollama server through its `/api/chat` endpoint. Both the
//! single-shot and the newline-delimited streaming modes are supported.

use crate::config::OllamaConfig;
use crate::error::{AgentdError, Result};
use crate::providers::{
    CompletionResponse, FunctionCall, Message, Provider, RawArgs, Role, TextStream, ToolCall,
};
use crate::tools::ToolDescriptor;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Fragments buffered between the HTTP reader task and the consumer
const STREAM_BUFFER: usize = 64;

/// Ollama API provider
///
/// # Examples
///
/// ```no_run
/// use agentd::config::OllamaConfig;
/// use agentd::providers::{Message, OllamaProvider, Provider};
///
/// # async fn example() -> agentd::error::Result<()> {
/// let provider = OllamaProvider::new(OllamaConfig::default())?;
/// let completion = provider.complete(&[Message::user("Hello!")], &[]).await?;
/// println!("{}", completion.message.text());
/// # Ok(())
/// # }
/// ```
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

/// Request structure for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDescriptor>,
    options: OllamaOptions,
    stream: bool,
}

/// Sampling options for Ollama API
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Message structure for Ollama API
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    #[serde(default = "default_role")]
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Tool call in Ollama format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "default_tool_type")]
    r#type: String,
    function: OllamaFunctionCall,
}

/// Function call details in Ollama format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn default_role() -> String {
    Role::Assistant.to_string()
}

/// Default type for tool calls (used when field is missing)
fn default_tool_type() -> String {
    "function".to_string()
}

/// Response structure from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
}

/// One line of an Ollama streaming response
#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    #[serde(default)]
    message: Option<OllamaStreamMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamMessage {
    #[serde(default)]
    content: String,
}

/// Outcome of decoding a single stream line
#[derive(Debug, PartialEq)]
enum StreamLine {
    Fragment { text: String, done: bool },
    Failed(String),
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use agentd::config::OllamaConfig;
    /// use agentd::providers::OllamaProvider;
    ///
    /// let provider = OllamaProvider::new(OllamaConfig::default());
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("agentd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentdError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self { client, config })
    }

    /// Get the configured Ollama host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Get the configured model name
    ///
    /// # Examples
    ///
    /// ```
    /// use agentd::config::OllamaConfig;
    /// use agentd::providers::OllamaProvider;
    ///
    /// let config = OllamaConfig {
    ///     model: "llama3.2:latest".to_string(),
    ///     ..OllamaConfig::default()
    /// };
    /// let provider = OllamaProvider::new(config).unwrap();
    /// assert_eq!(provider.model(), "llama3.2:latest");
    /// ```
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.host.trim_end_matches('/'))
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        stream: bool,
    ) -> OllamaRequest {
        OllamaRequest {
            model: self.config.model.clone(),
            messages: convert_messages(messages),
            tools: tools.iter().filter_map(normalize_tool).collect(),
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
            stream,
        }
    }

    async fn post_chat(&self, request: &OllamaRequest) -> Result<reqwest::Response> {
        tracing::debug!(
            "Sending Ollama request: {} messages, {} tools, stream={}",
            request.messages.len(),
            request.tools.len(),
            request.stream
        );

        self.client
            .post(self.chat_url())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                AgentdError::Provider(format!("Ollama request failed: {}", e)).into()
            })
    }
}

/// Validates and repairs a tool descriptor for Ollama
///
/// Returns `None` when the descriptor is not a function tool, has no name,
/// or carries no parameters schema. An object schema lacking a
/// `properties` map gets an empty one, since Ollama rejects it otherwise.
///
/// # Examples
///
/// ```
/// use agentd::providers::normalize_tool;
/// use agentd::tools::ToolDescriptor;
/// use serde_json::json;
///
/// let tool = ToolDescriptor::function("ping", "Ping", json!({"type": "object"}));
/// let normalized = normalize_tool(&tool).unwrap();
/// assert_eq!(normalized.function.parameters, Some(json!({"type": "object", "properties": {}})));
///
/// let nameless = ToolDescriptor::function("", "Nothing", json!({"type": "object"}));
/// assert!(normalize_tool(&nameless).is_none());
/// ```
pub fn normalize_tool(tool: &ToolDescriptor) -> Option<ToolDescriptor> {
    if tool.kind != "function" || tool.function.name.is_empty() {
        return None;
    }

    let mut parameters = tool.function.parameters.clone()?;
    if let Some(schema) = parameters.as_object_mut() {
        let is_object_schema = schema.get("type").and_then(Value::as_str) == Some("object");
        let has_properties = schema.get("properties").is_some_and(Value::is_object);
        if is_object_schema && !has_properties {
            schema.insert("properties".to_string(), Value::Object(serde_json::Map::new()));
        }
    }

    let mut normalized = tool.clone();
    normalized.function.parameters = Some(parameters);
    Some(normalized)
}

/// Convert agentd messages to Ollama format
fn convert_messages(messages: &[Message]) -> Vec<OllamaMessage> {
    messages
        .iter()
        .filter_map(|m| {
            // Skip messages without content (unless they have tool calls)
            if m.content.is_none() && m.tool_calls.is_none() {
                return None;
            }

            let tool_calls = m.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|tc| OllamaToolCall {
                        id: tc.id.clone(),
                        r#type: default_tool_type(),
                        function: OllamaFunctionCall {
                            name: tc.function.name.clone(),
                            arguments: tc
                                .function
                                .arguments
                                .to_structured()
                                .unwrap_or(Value::Object(serde_json::Map::new())),
                        },
                    })
                    .collect()
            });

            Some(OllamaMessage {
                role: m.role.to_string(),
                content: m.content.clone().unwrap_or_default(),
                tool_calls,
                tool_call_id: m.tool_call_id.clone(),
            })
        })
        .collect()
}

/// Convert an Ollama response message back to agentd format
fn convert_response_message(ollama_msg: OllamaMessage) -> Message {
    let content = Some(ollama_msg.content);
    match ollama_msg.tool_calls {
        Some(tool_calls) if !tool_calls.is_empty() => {
            let converted_calls = tool_calls
                .into_iter()
                .enumerate()
                .map(|(idx, tc)| ToolCall {
                    id: if tc.id.is_empty() {
                        format!("call_{}", idx)
                    } else {
                        tc.id
                    },
                    function: FunctionCall {
                        name: tc.function.name,
                        arguments: RawArgs::from(tc.function.arguments),
                    },
                })
                .collect();
            Message::assistant_with_tools(content, converted_calls)
        }
        _ => Message {
            content,
            ..Message::assistant("")
        },
    }
}

fn decode_stream_line(line: &[u8]) -> Option<StreamLine> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<OllamaStreamChunk>(line) {
        Ok(OllamaStreamChunk {
            error: Some(error), ..
        }) => Some(StreamLine::Failed(error)),
        Ok(chunk) => Some(StreamLine::Fragment {
            text: chunk.message.map(|m| m.content).unwrap_or_default(),
            done: chunk.done,
        }),
        Err(e) => {
            tracing::debug!("Skipping malformed Ollama stream line: {}", e);
            None
        }
    }
}

/// Forwards one decoded line; returns false when the stream should stop
async fn forward_line(line: &[u8], tx: &mpsc::Sender<Result<String>>) -> bool {
    match decode_stream_line(line) {
        None => true,
        Some(StreamLine::Failed(error)) => {
            tracing::error!("Ollama stream reported error: {}", error);
            let _ = tx
                .send(Err(
                    AgentdError::Provider(format!("Ollama stream error: {}", error)).into(),
                ))
                .await;
            false
        }
        Some(StreamLine::Fragment { text, done }) => {
            if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                tracing::debug!("Stream consumer dropped, stopping Ollama reader");
                return false;
            }
            !done
        }
    }
}

/// Splits an NDJSON byte stream into text fragments
///
/// Lines may be split across chunks. Malformed lines are skipped, the
/// trailing partial line is decoded once the body ends, and reading stops
/// at the first `done` line or when the receiver goes away.
async fn forward_ndjson_stream<S, E>(byte_stream: S, tx: mpsc::Sender<Result<String>>)
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
{
    tokio::pin!(byte_stream);
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::error!("Ollama stream interrupted: {}", e);
                let _ = tx
                    .send(Err(AgentdError::Provider(format!(
                        "Ollama stream interrupted: {}",
                        e
                    ))
                    .into()))
                    .await;
                return;
            }
        };

        buffer.extend_from_slice(&chunk);
        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            if !forward_line(&line, &tx).await {
                return;
            }
        }
    }

    if !buffer.is_empty() {
        forward_line(&buffer, &tx).await;
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<CompletionResponse> {
        let request = self.build_request(messages, tools, false);
        let response = self.post_chat(&request).await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status.as_u16(), error_text);
            return Err(AgentdError::Provider(format!(
                "Ollama error {}: {}",
                status.as_u16(),
                error_text
            ))
            .into());
        }

        let raw: Value = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            AgentdError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;
        let ollama_response: OllamaResponse = serde_json::from_value(raw.clone())
            .map_err(|e| AgentdError::Provider(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::debug!("Ollama response: done={}", ollama_response.done);

        let message = ollama_response
            .message
            .map(convert_response_message)
            .unwrap_or_else(|| Message::assistant(""));

        Ok(CompletionResponse::with_raw(message, raw))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<TextStream> {
        let request = self.build_request(messages, tools, true);
        let response = self.post_chat(&request).await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                "Ollama stream returned error {}: {}",
                status.as_u16(),
                error_text
            );
            return Err(AgentdError::Provider(format!(
                "Ollama stream error {}: {}",
                status.as_u16(),
                error_text
            ))
            .into());
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(forward_ndjson_stream(response.bytes_stream(), tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn get_current_model(&self) -> Result<String> {
        Ok(self.config.model.clone())
    }
}
