//! In-process memory provider
//!
//! Keeps every appended utterance in memory and mirrors it, best effort, to
//! a JSON-lines episode log per session on disk.

use crate::error::{AgentdError, Result};
use crate::memory::MemoryProvider;
use crate::providers::{Message, Role};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Entries shown in a retrieved context block
const CONTEXT_ENTRIES: usize = 5;
/// Characters kept per entry in a retrieved context block
const PREVIEW_CHARS: usize = 160;

/// One recorded utterance
#[derive(Debug, Clone, Serialize)]
struct MemoryEntry {
    /// Milliseconds since the Unix epoch
    ts: i64,
    role: Role,
    content: String,
}

/// Memory provider backed by process memory and an episode log
pub struct MockMemory {
    base_dir: PathBuf,
    logs: Mutex<HashMap<String, Vec<MemoryEntry>>>,
}

impl MockMemory {
    /// Create a provider writing episode logs under `base_dir`
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the episode log for `session_id`
    ///
    /// `None` when the id is not a single plain path component, so an id
    /// can never place a log outside `base_dir`.
    pub fn episode_path(&self, session_id: &str) -> Option<PathBuf> {
        is_plain_component(session_id)
            .then(|| self.base_dir.join(session_id).join("episode.log"))
    }

    async fn write_episode(&self, session_id: &str, entry: &MemoryEntry) -> std::io::Result<()> {
        let Some(path) = self.episode_path(session_id) else {
            tracing::warn!("Skipping episode log for unsafe session id {:?}", session_id);
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await
    }
}

fn is_plain_component(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn preview(content: &str) -> String {
    let truncated: String = content.chars().take(PREVIEW_CHARS).collect();
    if truncated.len() < content.len() {
        format!("{}…", truncated)
    } else {
        truncated
    }
}

#[async_trait]
impl MemoryProvider for MockMemory {
    async fn start(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await.map_err(|e| {
            AgentdError::Memory(format!(
                "Failed to create episode directory {}: {}",
                self.base_dir.display(),
                e
            ))
        })?;
        tracing::info!("Mock memory started at {}", self.base_dir.display());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.logs.lock().await.clear();
        tracing::info!("Mock memory stopped");
        Ok(())
    }

    async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let entry = MemoryEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            role,
            content: content.to_string(),
        };

        self.logs
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(entry.clone());

        if let Err(e) = self.write_episode(session_id, &entry).await {
            tracing::debug!("Episode log write failed for {}: {}", session_id, e);
        }
        Ok(())
    }

    async fn retrieve_context(&self, session_id: &str, _recent: &[Message]) -> Result<String> {
        let logs = self.logs.lock().await;
        let entries = logs.get(session_id).map(Vec::as_slice).unwrap_or_default();
        let start = entries.len().saturating_sub(CONTEXT_ENTRIES);

        let mut context = format!(
            "Memory context for session {} (mock)\nRecent notes:\n",
            session_id
        );
        let notes: Vec<String> = entries[start..]
            .iter()
            .map(|entry| format!("- {}: {}", entry.role, preview(&entry.content)))
            .collect();
        context.push_str(&notes.join("\n"));
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_error_contains, create_test_file};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_retrieve_context_without_history() {
        let dir = TempDir::new().unwrap();
        let memory = MockMemory::new(dir.path().to_path_buf());
        let context = memory.retrieve_context("s1", &[]).await.unwrap();
        assert_eq!(context, "Memory context for session s1 (mock)\nRecent notes:\n");
    }

    #[tokio::test]
    async fn test_retrieve_context_keeps_last_five_entries() {
        let dir = TempDir::new().unwrap();
        let memory = MockMemory::new(dir.path().to_path_buf());
        for i in 0..7 {
            memory
                .append("s1", Role::Assistant, &format!("note {}", i))
                .await
                .unwrap();
        }

        let context = memory.retrieve_context("s1", &[]).await.unwrap();
        assert!(!context.contains("note 1"));
        assert!(context.contains("- assistant: note 2"));
        assert!(context.ends_with("- assistant: note 6"));
        assert_eq!(context.lines().filter(|l| l.starts_with("- ")).count(), 5);
    }

    #[tokio::test]
    async fn test_retrieve_context_truncates_long_entries() {
        let dir = TempDir::new().unwrap();
        let memory = MockMemory::new(dir.path().to_path_buf());
        memory.append("s1", Role::User, &"é".repeat(200)).await.unwrap();

        let context = memory.retrieve_context("s1", &[]).await.unwrap();
        let note = context.lines().last().unwrap();
        assert_eq!(note, format!("- user: {}…", "é".repeat(160)));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let dir = TempDir::new().unwrap();
        let memory = MockMemory::new(dir.path().to_path_buf());
        memory.append("a", Role::User, "alpha").await.unwrap();

        let context = memory.retrieve_context("b", &[]).await.unwrap();
        assert!(!context.contains("alpha"));
    }

    #[tokio::test]
    async fn test_append_writes_episode_log() {
        let dir = TempDir::new().unwrap();
        let memory = MockMemory::new(dir.path().to_path_buf());
        memory.start().await.unwrap();
        memory.append("s1", Role::Assistant, "hello").await.unwrap();
        memory.append("s1", Role::User, "again").await.unwrap();

        let log = std::fs::read_to_string(memory.episode_path("s1").unwrap()).unwrap();
        let lines: Vec<serde_json::Value> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["role"], "assistant");
        assert_eq!(lines[0]["content"], "hello");
        assert!(lines[0]["ts"].is_i64());
    }

    #[test]
    fn test_episode_path_rejects_unsafe_ids() {
        let memory = MockMemory::new(PathBuf::from("/srv/episodes"));
        assert_eq!(
            memory.episode_path("chat-1"),
            Some(PathBuf::from("/srv/episodes/chat-1/episode.log"))
        );
        for id in ["", ".", "..", "../escaped", "a/b", "a\\b", "/etc", "nested/"] {
            assert_eq!(memory.episode_path(id), None, "id {:?}", id);
        }
    }

    #[tokio::test]
    async fn test_traversal_id_stays_inside_base_dir() {
        let dir = TempDir::new().unwrap();
        let memory = MockMemory::new(dir.path().join("episodes"));
        memory.start().await.unwrap();

        memory.append("../escaped", Role::User, "hi").await.unwrap();

        assert!(!dir.path().join("escaped").exists());
        let context = memory.retrieve_context("../escaped", &[]).await.unwrap();
        assert!(context.contains("- user: hi"));
    }

    #[tokio::test]
    async fn test_absolute_id_does_not_replace_base_dir() {
        let dir = TempDir::new().unwrap();
        let memory = MockMemory::new(dir.path().join("episodes"));
        let target = dir.path().join("abs-target");
        let id = target.to_string_lossy().into_owned();

        memory.append(&id, Role::User, "hi").await.unwrap();

        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_start_reports_memory_error() {
        let dir = TempDir::new().unwrap();
        let blocker = create_test_file(&dir, "blocker", "not a directory");
        let memory = MockMemory::new(blocker.join("episodes"));

        assert_error_contains(
            memory.start().await,
            "Memory error: Failed to create episode directory",
        );
    }

    #[tokio::test]
    async fn test_append_ignores_unwritable_log() {
        let dir = TempDir::new().unwrap();
        let blocker = create_test_file(&dir, "blocker", "not a directory");
        let memory = MockMemory::new(blocker);

        assert!(memory.append("s1", Role::User, "kept").await.is_ok());
        let context = memory.retrieve_context("s1", &[]).await.unwrap();
        assert!(context.contains("- user: kept"));
    }

    #[tokio::test]
    async fn test_stop_clears_logs() {
        let dir = TempDir::new().unwrap();
        let memory = MockMemory::new(dir.path().to_path_buf());
        memory.append("s1", Role::User, "gone").await.unwrap();
        memory.stop().await.unwrap();

        let context = memory.retrieve_context("s1", &[]).await.unwrap();
        assert!(!context.contains("gone"));
    }
}
