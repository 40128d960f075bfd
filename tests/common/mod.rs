use agentd::agent::TurnOrchestrator;
use agentd::config::Config;
use agentd::error::{AgentdError, Result};
use agentd::memory::{MemoryProvider, MockMemory};
use agentd::prompts::PromptTemplates;
use agentd::providers::{CompletionResponse, Message, Provider, TextStream};
use agentd::runtime::AgentRuntime;
use agentd::session::SessionStore;
use agentd::tools::{ToolDescriptor, ToolExecutor};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Provider that replays scripted replies and records every request
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<std::result::Result<Message, String>>>,
    fragments: Mutex<Vec<std::result::Result<String, String>>>,
    requests: Mutex<Vec<Vec<Message>>>,
    tool_lists: Mutex<Vec<Vec<ToolDescriptor>>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn reply(self, message: Message) -> Self {
        self.replies.lock().unwrap().push_back(Ok(message));
        self
    }

    /// Queue a failing reply
    pub fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// Fragments returned by the next streaming call
    pub fn stream(self, fragments: &[&str]) -> Self {
        *self.fragments.lock().unwrap() = fragments.iter().map(|f| Ok(f.to_string())).collect();
        self
    }

    /// Append a stream failure after the scripted fragments
    pub fn stream_error(self, message: &str) -> Self {
        self.fragments
            .lock()
            .unwrap()
            .push(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn tool_lists(&self) -> Vec<Vec<ToolDescriptor>> {
        self.tool_lists.lock().unwrap().clone()
    }

    fn record(&self, messages: &[Message], tools: &[ToolDescriptor]) {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.tool_lists.lock().unwrap().push(tools.to_vec());
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<CompletionResponse> {
        self.record(messages, tools);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(message)) => Ok(CompletionResponse::new(message)),
            Some(Err(error)) => Err(AgentdError::Provider(error).into()),
            None => Ok(CompletionResponse::new(Message::assistant("Done"))),
        }
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<TextStream> {
        self.record(messages, tools);
        let items: Vec<Result<String>> = self
            .fragments
            .lock()
            .unwrap()
            .drain(..)
            .map(|item| item.map_err(|e| AgentdError::Provider(e).into()))
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn get_current_model(&self) -> Result<String> {
        Ok("scripted".to_string())
    }
}

/// Orchestrator over `provider` with mock memory and `file_read` rooted in `dir`
#[allow(dead_code)]
pub fn orchestrator(provider: Arc<ScriptedProvider>, dir: &TempDir) -> TurnOrchestrator {
    TurnOrchestrator::new(
        provider,
        Arc::new(MockMemory::new(dir.path().join("episodes"))),
        Arc::new(PromptTemplates::default()),
        Arc::new(SessionStore::new("global")),
    )
    .with_tool_executor(Arc::new(ToolExecutor::with_builtins(dir.path())))
}

/// Running runtime over `provider`
#[allow(dead_code)]
pub async fn runtime(provider: Arc<ScriptedProvider>, dir: &TempDir) -> AgentRuntime {
    let memory: Arc<dyn MemoryProvider> = Arc::new(MockMemory::new(dir.path().join("episodes")));
    let orchestrator = TurnOrchestrator::new(
        provider.clone(),
        memory.clone(),
        Arc::new(PromptTemplates::default()),
        Arc::new(SessionStore::new("global")),
    )
    .with_tool_executor(Arc::new(ToolExecutor::with_builtins(dir.path())));

    let mut config = Config::default();
    config.agent.home = dir.path().to_path_buf();
    AgentRuntime::from_parts(config, provider, memory, orchestrator)
        .await
        .expect("failed to start runtime")
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
