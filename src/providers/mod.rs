//! Provider module for agentd
//!
//! This module contains the chat backend abstraction and the Ollama
//! implementation. OpenAI and Anthropic are recognized backend names but
//! have no adapter yet.

pub mod base;
pub mod ollama;

pub use base::{
    CompletionResponse, FunctionCall, Message, Provider, RawArgs, Role, TextStream, ToolCall,
};
pub use ollama::{normalize_tool, OllamaProvider};

use crate::config::ProviderConfig;
use crate::error::{AgentdError, Result};
use std::sync::Arc;

/// Create a provider instance based on configuration
///
/// # Errors
///
/// Returns error if the backend is unimplemented, unknown, or its
/// initialization fails
///
/// # Examples
///
/// ```
/// use agentd::config::ProviderConfig;
/// use agentd::providers::create_provider;
///
/// let config = ProviderConfig::default();
/// assert!(create_provider(&config).is_ok());
///
/// let config = ProviderConfig {
///     provider_type: "openai".to_string(),
///     ..ProviderConfig::default()
/// };
/// let err = create_provider(&config).err().unwrap();
/// assert!(err.to_string().contains("OpenAI backend not implemented yet"));
/// ```
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    match config.provider_type.as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(config.ollama.clone())?)),
        "openai" => Err(AgentdError::Config("OpenAI backend not implemented yet".to_string()).into()),
        "anthropic" => {
            Err(AgentdError::Config("Anthropic backend not implemented yet".to_string()).into())
        }
        other => Err(AgentdError::Config(format!("Unknown backend type: {}", other)).into()),
    }
}
