//! Agent runtime
//!
//! The runtime is the composition root of a running agent: it builds the
//! backend, memory, prompts, tools and session store from configuration and
//! owns them for the lifetime of the process.

use crate::agent::{TurnOrchestrator, TurnReply};
use crate::config::Config;
use crate::error::Result;
use crate::memory::{create_memory, MemoryProvider};
use crate::prompts::PromptTemplates;
use crate::providers::{create_provider, Message, Provider};
use crate::session::SessionStore;
use crate::tools::{load_tools, ToolDescriptor, ToolExecutor};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Lifecycle state of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeState {
    /// Components are being built
    Initializing,
    /// Accepting turns
    Running,
    /// Stopped, memory released
    Stopped,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Snapshot reported by `/status` and the `status` command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeStatus {
    /// Runtime instance id
    pub id: String,
    /// Lifecycle state
    pub status: RuntimeState,
    /// Configured backend type
    pub backend: String,
    /// Number of sessions created so far
    pub sessions: usize,
}

/// A running agent
pub struct AgentRuntime {
    id: String,
    config: Config,
    provider: Arc<dyn Provider>,
    memory: Arc<dyn MemoryProvider>,
    orchestrator: TurnOrchestrator,
    state: Mutex<RuntimeState>,
}

impl AgentRuntime {
    /// Build every component from `config` and start the memory provider
    ///
    /// # Errors
    ///
    /// Returns error for an unknown backend or memory type, a malformed
    /// tools file, or a memory provider that fails to start
    pub async fn new(config: Config) -> Result<Self> {
        let provider = create_provider(&config.provider)?;
        let memory = create_memory(&config.memory, &config.episodes_dir())?;
        let prompts =
            PromptTemplates::load(&config.prompts.builtin_dir, &config.prompt_user_dir()).await;
        let default_tools = load_tools(&config.tools_file()).await?;
        let executor = ToolExecutor::with_builtins(std::env::current_dir()?);

        tracing::info!(
            "Loaded {} default tools, {} user prompt templates",
            default_tools.len(),
            prompts.user_templates.len()
        );

        let sessions = Arc::new(SessionStore::new(config.sessions.default_id.clone()));
        let orchestrator =
            TurnOrchestrator::new(provider.clone(), memory.clone(), Arc::new(prompts), sessions)
                .with_tool_executor(Arc::new(executor))
                .with_default_tools(default_tools)
                .with_telemetry(config.telemetry.clone());

        Self::from_parts(config, provider, memory, orchestrator).await
    }

    /// Assemble a runtime from prebuilt components and start it
    ///
    /// # Errors
    ///
    /// Returns error if the memory provider fails to start
    pub async fn from_parts(
        config: Config,
        provider: Arc<dyn Provider>,
        memory: Arc<dyn MemoryProvider>,
        orchestrator: TurnOrchestrator,
    ) -> Result<Self> {
        let runtime = Self {
            id: Uuid::new_v4().to_string(),
            config,
            provider,
            memory,
            orchestrator,
            state: Mutex::new(RuntimeState::Initializing),
        };

        runtime.memory.start().await?;
        runtime.set_state(RuntimeState::Running);
        tracing::info!(
            "Agent runtime {} running with {} backend",
            runtime.id,
            runtime.config.provider.provider_type
        );
        Ok(runtime)
    }

    fn set_state(&self, state: RuntimeState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Runtime instance id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> RuntimeState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the runtime running
    pub async fn start(&self) -> Result<()> {
        self.set_state(RuntimeState::Running);
        Ok(())
    }

    /// Mark the runtime stopped and stop the memory provider
    ///
    /// # Errors
    ///
    /// Returns error if the memory provider fails to stop
    pub async fn stop(&self) -> Result<()> {
        self.set_state(RuntimeState::Stopped);
        self.memory.stop().await?;
        tracing::info!("Agent runtime {} stopped", self.id);
        Ok(())
    }

    /// Stop then start
    pub async fn restart(&self) -> Result<()> {
        self.stop().await?;
        self.start().await
    }

    /// Run one turn
    ///
    /// # Errors
    ///
    /// Returns error if the backend or memory provider fails
    pub async fn chat(
        &self,
        session_id: Option<&str>,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<TurnReply> {
        self.orchestrator.chat(session_id, messages, tools).await
    }

    /// Current status snapshot
    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            id: self.id.clone(),
            status: self.state(),
            backend: self.config.provider.provider_type.clone(),
            sessions: self.orchestrator.sessions().count(),
        }
    }

    /// Configuration the runtime was built from
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Chat backend
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Turn orchestrator
    pub fn orchestrator(&self) -> &TurnOrchestrator {
        &self.orchestrator
    }

    /// Session store
    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.orchestrator.sessions()
    }
}
