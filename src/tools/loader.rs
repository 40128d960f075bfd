//! Default tool list loading
//!
//! Reads the JSON tools file that supplies descriptors when a caller sends
//! no tools of its own.

use crate::error::{AgentdError, Result};
use crate::tools::ToolDescriptor;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;

/// Load tool descriptors from a JSON file
///
/// The file must hold an array whose every entry has `type: "function"`
/// and a non-empty `function.name`. A missing file yields an empty list.
///
/// # Errors
///
/// Returns `Failed to load tools: ...` for unreadable files, invalid JSON,
/// or any invalid entry
pub async fn load_tools(path: &Path) -> Result<Vec<ToolDescriptor>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!("Tools file not found: {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(load_error(e)),
    };

    let tools = parse_tools(&text).map_err(load_error)?;
    tracing::info!("Loaded {} tool(s) from {}", tools.len(), path.display());
    Ok(tools)
}

fn load_error(e: impl std::fmt::Display) -> anyhow::Error {
    AgentdError::Tool(format!("Failed to load tools: {}", e)).into()
}

fn parse_tools(text: &str) -> std::result::Result<Vec<ToolDescriptor>, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let entries = value
        .as_array()
        .ok_or_else(|| "tools file must contain a JSON array".to_string())?;

    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let is_function = entry.get("type").and_then(Value::as_str) == Some("function");
            let has_name = entry
                .pointer("/function/name")
                .and_then(Value::as_str)
                .is_some_and(|name| !name.is_empty());
            if !is_function || !has_name {
                return Err(format!(
                    "tool #{} must have type \"function\" and a function.name",
                    idx
                ));
            }
            serde_json::from_value(entry.clone()).map_err(|e| e.to_string())
        })
        .collect()
}
