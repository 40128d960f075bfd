//! Test utilities for agentd
//!
//! This module provides common test utilities: temporary directories and
//! files, error assertions, an echoing provider and a ready-made runtime.

use crate::agent::TurnOrchestrator;
use crate::config::Config;
use crate::error::Result;
use crate::memory::{MemoryProvider, MockMemory};
use crate::prompts::PromptTemplates;
use crate::providers::{CompletionResponse, Message, Provider, Role, TextStream};
use crate::runtime::AgentRuntime;
use crate::session::SessionStore;
use crate::tools::ToolDescriptor;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Default configuration rooted in `home`
pub fn test_config(home: &TempDir) -> Config {
    let mut config = Config::default();
    config.agent.home = home.path().to_path_buf();
    config.prompts.builtin_dir = home.path().join("builtin-prompts");
    config
}

/// Provider that answers with the last user message
///
/// Streaming yields the reply one whitespace-separated word at a time.
pub struct EchoProvider;

fn last_user_text(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.text().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl Provider for EchoProvider {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<CompletionResponse> {
        Ok(CompletionResponse::new(Message::assistant(last_user_text(
            messages,
        ))))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<TextStream> {
        let words: Vec<Result<String>> = last_user_text(messages)
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(words)))
    }

    fn get_current_model(&self) -> Result<String> {
        Ok("echo".to_string())
    }
}

/// Runtime over [`EchoProvider`] and mock memory rooted in `dir`
pub async fn echo_runtime(dir: &TempDir) -> AgentRuntime {
    let provider: Arc<dyn Provider> = Arc::new(EchoProvider);
    let memory: Arc<dyn MemoryProvider> = Arc::new(MockMemory::new(dir.path().join("episodes")));
    let orchestrator = TurnOrchestrator::new(
        provider.clone(),
        memory.clone(),
        Arc::new(PromptTemplates::default()),
        Arc::new(SessionStore::new("global")),
    );
    AgentRuntime::from_parts(test_config(dir), provider, memory, orchestrator)
        .await
        .expect("Failed to start test runtime")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentdError;
    use futures::StreamExt;

    #[test]
    fn test_create_test_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "test.txt", "content");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<()> = Err(AgentdError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    fn test_test_config_is_valid() {
        let dir = temp_dir();
        let config = test_config(&dir);
        assert!(config.validate().is_ok());
        assert_eq!(config.episodes_dir(), dir.path().join("episodes"));
    }

    #[tokio::test]
    async fn test_echo_provider_streams_words() {
        let stream = EchoProvider
            .complete_stream(&[Message::user("one two three")], &[])
            .await
            .unwrap();
        let words: Vec<String> = stream.map(|w| w.unwrap()).collect().await;
        assert_eq!(words, vec!["one ", "two ", "three"]);
    }
}
