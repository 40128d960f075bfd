//! Tool call execution
//!
//! Dispatches model-issued tool calls to registered handlers. Failures of
//! any kind (unknown tool, undecodable arguments, handler error or panic)
//! are reported as failed [`ToolResult`]s and never propagate.

use crate::providers::ToolCall;
use crate::tools::{FileReadTool, ToolRegistry, ToolResult};
use futures::FutureExt;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

/// Executes tool calls against a [`ToolRegistry`]
pub struct ToolExecutor {
    registry: ToolRegistry,
}

impl ToolExecutor {
    /// Create an executor over an existing registry
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Create an executor with the built-in tools
    ///
    /// Relative `file_read` paths resolve against `working_dir`.
    ///
    /// # Examples
    ///
    /// ```
    /// use agentd::tools::ToolExecutor;
    ///
    /// let executor = ToolExecutor::with_builtins(std::env::temp_dir());
    /// assert!(executor.has_implementation("file_read"));
    /// assert!(!executor.has_implementation("shell"));
    /// ```
    pub fn with_builtins(working_dir: impl Into<PathBuf>) -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FileReadTool::new(working_dir.into())));
        Self::new(registry)
    }

    /// Returns true when a handler exists for `name`
    pub fn has_implementation(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Names of all implemented tools
    pub fn list_available(&self) -> BTreeSet<String> {
        self.registry.names().map(str::to_string).collect()
    }

    /// Executes a single tool call
    pub async fn execute_one(&self, call: &ToolCall) -> ToolResult {
        let name = call.function.name.as_str();
        let Some(handler) = self.registry.get(name) else {
            tracing::warn!("Model requested unknown tool: {}", name);
            return ToolResult::failure(call, format!("Unknown tool: {}", name));
        };

        let args = match call.function.arguments.to_structured() {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("Undecodable arguments for tool {}: {}", name, e);
                return ToolResult::failure(call, format!("Invalid arguments for {}: {}", name, e));
            }
        };

        match AssertUnwindSafe(handler.execute(args)).catch_unwind().await {
            Ok(Ok(value)) => ToolResult::success(call, value),
            Ok(Err(e)) => {
                tracing::debug!("Tool {} failed: {}", name, e);
                ToolResult::failure(call, e.to_string())
            }
            Err(_) => {
                tracing::error!("Tool {} panicked", name);
                ToolResult::failure(call, format!("Tool {} panicked", name))
            }
        }
    }

    /// Executes calls sequentially, returning results in call order
    pub async fn execute_batch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        tracing::info!("Executing {} tool call(s)", calls.len());

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_one(call).await);
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        tracing::info!(
            "Tool batch finished: {} succeeded, {} failed",
            succeeded,
            results.len() - succeeded
        );
        results
    }
}
