//! Tools module for agentd
//!
//! This module contains the tool descriptor model, the handler trait and
//! registry for locally implemented tools, the batch executor, and the
//! loader for the default tools file.

pub mod executor;
pub mod file_read;
pub mod loader;

pub use executor::ToolExecutor;
pub use file_read::FileReadTool;
pub use loader::load_tools;

use crate::error::Result;
use crate::providers::{Message, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Function tool descriptor in the OpenAI function-calling format
///
/// Every field tolerates absence on input so that malformed caller tools
/// can be parsed and then dropped by [`normalize_tool`](crate::providers::normalize_tool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool kind, `"function"` for every tool agentd understands
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Function metadata
    #[serde(default)]
    pub function: FunctionSpec,
}

/// Function metadata inside a [`ToolDescriptor`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Function name
    #[serde(default)]
    pub name: String,
    /// Human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDescriptor {
    /// Create a function tool descriptor
    ///
    /// # Examples
    ///
    /// ```
    /// use agentd::tools::ToolDescriptor;
    /// use serde_json::json;
    ///
    /// let tool = ToolDescriptor::function("ping", "Check liveness", json!({"type": "object"}));
    /// assert_eq!(tool.kind, "function");
    /// assert_eq!(tool.name(), "ping");
    /// ```
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: name.into(),
                description: Some(description.into()),
                parameters: Some(parameters),
            },
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Outcome of one tool call
///
/// Exactly one of `result` and `error` is populated, matching `success`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    /// Identifier of the tool call this result answers
    pub tool_call_id: String,
    /// Name of the function that was requested
    pub function_name: String,
    /// Whether the tool execution succeeded
    pub success: bool,
    /// Success payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message if execution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful tool result for `call`
    pub fn success(call: &ToolCall, result: Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            function_name: call.function.name.clone(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Create a failed tool result for `call`
    pub fn failure(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            function_name: call.function.name.clone(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Convert to a tool-role message for the follow-up completion
    ///
    /// Successful payloads are JSON-encoded; failures read `Error: <message>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use agentd::providers::{FunctionCall, RawArgs, Role, ToolCall};
    /// use agentd::tools::ToolResult;
    /// use serde_json::json;
    ///
    /// let call = ToolCall {
    ///     id: "call_1".to_string(),
    ///     function: FunctionCall { name: "file_read".to_string(), arguments: RawArgs::default() },
    /// };
    /// let msg = ToolResult::success(&call, json!("hello")).to_message();
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.content.as_deref(), Some("\"hello\""));
    /// ```
    pub fn to_message(&self) -> Message {
        let content = if self.success {
            self.result
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_else(|| Value::Null.to_string())
        } else {
            format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("Unknown error")
            )
        };
        Message::tool_result(self.tool_call_id.clone(), content)
    }
}

/// Handler trait for locally implemented tools
///
/// # Examples
///
/// ```no_run
/// use agentd::error::Result;
/// use agentd::tools::{ToolDescriptor, ToolHandler};
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
///
/// struct PingTool;
///
/// #[async_trait]
/// impl ToolHandler for PingTool {
///     fn tool_definition(&self) -> ToolDescriptor {
///         ToolDescriptor::function("ping", "Check liveness", json!({"type": "object"}))
///     }
///
///     async fn execute(&self, _args: Value) -> Result<Value> {
///         Ok(json!("pong"))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Returns the descriptor advertised to backends
    fn tool_definition(&self) -> ToolDescriptor;

    /// Executes the tool with decoded arguments
    ///
    /// # Errors
    ///
    /// Returns error with the message that becomes the tool result's error
    async fn execute(&self, args: Value) -> Result<Value>;
}

/// Registry of locally implemented tools keyed by function name
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool handler under its descriptor's name
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.tool_definition().function.name;
        self.tools.insert(name, handler);
    }

    /// Get a tool handler by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    /// Check whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered tools
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Get all tool descriptors
    pub fn all_definitions(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|handler| handler.tool_definition())
            .collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
