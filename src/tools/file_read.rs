//! file_read tool for reading text files
//!
//! Reads a UTF-8 file, optionally narrowed to a half-open range of
//! zero-based line indices.

use crate::error::Result;
use crate::tools::{ToolDescriptor, ToolHandler};
use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::PathBuf;

/// Parameters for the file_read tool
#[derive(Debug, Deserialize)]
struct FileReadParams {
    /// Path of the file to read
    file: String,
    /// First line to include (zero-based)
    #[serde(default)]
    start_line: Option<usize>,
    /// Line to stop before (zero-based, exclusive)
    #[serde(default)]
    end_line: Option<usize>,
}

/// Tool for reading file contents
///
/// Relative paths resolve against the working directory given at
/// construction; absolute paths are used as-is.
///
/// # Examples
///
/// ```
/// use agentd::tools::{FileReadTool, ToolHandler};
/// use serde_json::json;
///
/// let tool = FileReadTool::new(std::env::temp_dir());
/// # tokio_test::block_on(async {
/// let result = tool.execute(json!({"file": "definitely-missing.txt"})).await;
/// assert_eq!(result.unwrap_err().to_string(), "File not found: definitely-missing.txt");
/// # });
/// ```
pub struct FileReadTool {
    working_dir: PathBuf,
}

impl FileReadTool {
    /// Creates a new FileReadTool rooted at `working_dir`
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }
}

/// Lines `[start, end)` of `content`, both bounds clamped to the line count
fn slice_lines(content: &str, start: Option<usize>, end: Option<usize>) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let end = end.unwrap_or(lines.len()).min(lines.len());
    let start = start.unwrap_or(0).min(end);
    lines[start..end].join("\n")
}

#[async_trait]
impl ToolHandler for FileReadTool {
    fn tool_definition(&self) -> ToolDescriptor {
        ToolDescriptor::function(
            "file_read",
            "Read a UTF-8 text file, optionally limited to a range of lines.",
            json!({
                "type": "object",
                "properties": {
                    "file": {
                        "type": "string",
                        "description": "Path to the file to read"
                    },
                    "start_line": {
                        "type": "integer",
                        "description": "First line to return (0-based, inclusive)"
                    },
                    "end_line": {
                        "type": "integer",
                        "description": "Line to stop before (0-based, exclusive)"
                    }
                },
                "required": ["file"]
            }),
        )
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let params: FileReadParams = serde_json::from_value(args)
            .map_err(|e| anyhow!("Invalid arguments for file_read: {}", e))?;

        let path = self.working_dir.join(&params.file);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => anyhow!("File not found: {}", params.file),
                ErrorKind::PermissionDenied => anyhow!("Permission denied: {}", params.file),
                _ => anyhow!("Failed to read file {}: {}", params.file, e),
            })?;

        if params.start_line.is_none() && params.end_line.is_none() {
            return Ok(Value::String(content));
        }

        Ok(Value::String(slice_lines(
            &content,
            params.start_line,
            params.end_line,
        )))
    }
}
