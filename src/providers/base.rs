//! Base provider trait and common message types for agentd
//!
//! This module defines the [`Provider`] trait every backend adapter
//! implements, along with the conversation message model shared by the
//! session store, the turn orchestrator, and the HTTP surface.

use crate::error::Result;
use crate::tools::ToolDescriptor;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::pin::Pin;

/// Role of a conversation message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions injected ahead of the conversation
    System,
    /// End-user input
    User,
    /// Model output
    Assistant,
    /// Result of a tool invocation
    Tool,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message structure for conversation
///
/// Content is optional: assistant messages that only carry tool calls have
/// none, and caller content that is not plain text (for example multimodal
/// part arrays) is treated as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Text content of the message
    #[serde(
        default,
        deserialize_with = "text_content",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<String>,
    /// Tool calls requested by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Tool call this message answers (tool role only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

fn text_content<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    })
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use agentd::providers::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Some(content.into()))
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    /// Creates a new tool result message
    ///
    /// # Arguments
    ///
    /// * `tool_call_id` - The ID of the tool call this result corresponds to
    /// * `content` - The tool execution result content
    ///
    /// # Examples
    ///
    /// ```
    /// use agentd::providers::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "File contents...");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
    /// ```
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, Some(content.into()))
        }
    }

    /// Creates an assistant message carrying tool calls
    ///
    /// The content, if any, is kept as the backend produced it.
    ///
    /// # Examples
    ///
    /// ```
    /// use agentd::providers::{FunctionCall, Message, RawArgs, ToolCall};
    ///
    /// let call = ToolCall {
    ///     id: "call_123".to_string(),
    ///     function: FunctionCall {
    ///         name: "file_read".to_string(),
    ///         arguments: RawArgs::Encoded(r#"{"file":"notes.txt"}"#.to_string()),
    ///     },
    /// };
    /// let msg = Message::assistant_with_tools(None, vec![call]);
    /// assert!(msg.content.is_none());
    /// assert_eq!(msg.tool_calls.map(|c| c.len()), Some(1));
    /// ```
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::with_role(Role::Assistant, content)
        }
    }

    /// Text content, or the empty string when absent
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Returns true when content is absent or only whitespace
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    /// Tool calls carried by this message, empty when none
    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// Tool call arguments as the backend produced them
///
/// OpenAI-style backends encode arguments as a JSON string while Ollama
/// returns a structured object. Both shapes are accepted and decoded on
/// demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawArgs {
    /// JSON-encoded argument object
    Encoded(String),
    /// Already structured argument value
    Structured(Value),
}

impl Default for RawArgs {
    fn default() -> Self {
        Self::Structured(Value::Object(serde_json::Map::new()))
    }
}

impl From<Value> for RawArgs {
    fn from(value: Value) -> Self {
        match value {
            Value::String(encoded) => Self::Encoded(encoded),
            other => Self::Structured(other),
        }
    }
}

impl RawArgs {
    /// Decodes the arguments into a structured value
    ///
    /// # Errors
    ///
    /// Returns the decode error when encoded arguments are not valid JSON.
    pub fn to_structured(&self) -> std::result::Result<Value, serde_json::Error> {
        match self {
            Self::Encoded(encoded) => serde_json::from_str(encoded),
            Self::Structured(value) => Ok(value.clone()),
        }
    }
}

/// Function call information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function/tool to call
    pub name: String,
    /// Arguments for the function
    #[serde(default)]
    pub arguments: RawArgs,
}

/// Tool call structure
///
/// Represents a request from the model to execute a tool with specific
/// arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    #[serde(default)]
    pub id: String,
    /// Function call details
    pub function: FunctionCall,
}

/// Response from a backend completion
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The normalized assistant message
    pub message: Message,
    /// Unmodified backend payload
    pub raw: Value,
}

impl CompletionResponse {
    /// Creates a response without a raw payload
    ///
    /// # Examples
    ///
    /// ```
    /// use agentd::providers::{CompletionResponse, Message};
    ///
    /// let response = CompletionResponse::new(Message::assistant("Hello!"));
    /// assert_eq!(response.message.text(), "Hello!");
    /// assert!(response.raw.is_null());
    /// ```
    pub fn new(message: Message) -> Self {
        Self {
            message,
            raw: Value::Null,
        }
    }

    /// Creates a response that keeps the backend payload alongside the message
    pub fn with_raw(message: Message, raw: Value) -> Self {
        Self { message, raw }
    }
}

/// Lazy stream of text fragments produced by a streaming completion
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Provider trait for chat backends
///
/// # Examples
///
/// ```no_run
/// use agentd::error::Result;
/// use agentd::providers::{CompletionResponse, Message, Provider};
/// use agentd::tools::ToolDescriptor;
/// use async_trait::async_trait;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     async fn complete(
///         &self,
///         messages: &[Message],
///         _tools: &[ToolDescriptor],
///     ) -> Result<CompletionResponse> {
///         let last = messages.last().map(|m| m.text().to_string()).unwrap_or_default();
///         Ok(CompletionResponse::new(Message::assistant(last)))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Completes a conversation with the given messages and available tools
    ///
    /// # Errors
    ///
    /// Returns error if the backend call fails or its response is invalid
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<CompletionResponse>;

    /// Starts a streaming completion
    ///
    /// The returned stream yields non-empty text fragments in backend order
    /// and ends when the backend signals completion.
    ///
    /// # Default Implementation
    ///
    /// Returns [`AgentdError::StreamingNotSupported`](crate::error::AgentdError).
    async fn complete_stream(
        &self,
        _messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<TextStream> {
        Err(crate::error::AgentdError::StreamingNotSupported.into())
    }

    /// Get the name of the currently active model
    ///
    /// # Default Implementation
    ///
    /// The default implementation returns an unavailable error.
    fn get_current_model(&self) -> Result<String> {
        Err(crate::error::AgentdError::Provider(
            "Current model information is not available from this provider".to_string(),
        )
        .into())
    }
}
