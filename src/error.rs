//! Error types for agentd
//!
//! This module defines the error types used throughout the gateway,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for agentd operations
///
/// Covers configuration loading, backend interactions, tool execution,
/// and the memory provider. Lower-level library errors convert into it
/// through `#[from]`.
#[derive(Error, Debug)]
pub enum AgentdError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend errors (non-success status, malformed body, unknown backend)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool execution or tool file errors
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Memory provider errors
    #[error("Memory error: {0}")]
    Memory(String),

    /// Streaming not supported by provider
    #[error("Streaming is not supported by this provider")]
    StreamingNotSupported,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for agentd operations
///
/// Uses `anyhow::Error` so callers can attach context while still being
/// able to downcast to [`AgentdError`].
pub type Result<T> = anyhow::Result<T>;
