//! Long-term memory providers
//!
//! A memory provider records what was said in each session and produces a
//! context block that the turn orchestrator injects as the second system
//! message of every backend request.

pub mod mock;

pub use mock::MockMemory;

use crate::config::MemoryConfig;
use crate::error::{AgentdError, Result};
use crate::providers::{Message, Role};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Contract for memory backends
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    /// Prepare backing storage
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources and drop in-process state
    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Record an utterance for `session_id`
    async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()>;

    /// Produce the context block for the next backend request
    ///
    /// `recent` holds at most the last ten messages of the session history
    /// followed by the incoming messages.
    async fn retrieve_context(&self, session_id: &str, recent: &[Message]) -> Result<String>;
}

/// Create a memory provider based on configuration
///
/// `episodes_dir` is where file-backed providers keep their logs.
///
/// # Errors
///
/// Returns a configuration error for an unknown memory type
pub fn create_memory(config: &MemoryConfig, episodes_dir: &Path) -> Result<Arc<dyn MemoryProvider>> {
    match config.memory_type.as_str() {
        "mock" => Ok(Arc::new(MockMemory::new(episodes_dir.to_path_buf()))),
        other => Err(AgentdError::Config(format!("Unknown memory type: {}", other)).into()),
    }
}
