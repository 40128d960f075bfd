//! Turn orchestration
//!
//! A turn walks PREPARE → DISPATCH → (RESOLVE → FOLLOWUP) → COMMIT while
//! holding its session lock, so turns on one session never interleave.
//! Tool calls are resolved at most once per turn; tool calls in the
//! follow-up reply are returned to the caller unexecuted.

use crate::agent::sanitize::{sanitize, strip_system};
use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::memory::MemoryProvider;
use crate::prompts::PromptTemplates;
use crate::providers::{Message, Provider, Role, ToolCall};
use crate::session::{Session, SessionStore};
use crate::tools::{ToolDescriptor, ToolExecutor};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

/// Messages of history plus incoming handed to the memory provider
const MEMORY_WINDOW: usize = 10;
/// Characters kept per message in request telemetry
const MESSAGE_PREVIEW_CHARS: usize = 120;
/// Characters kept of a reply in request telemetry
const REPLY_PREVIEW_CHARS: usize = 240;
/// Turn events buffered ahead of a slow stream consumer
const EVENT_BUFFER: usize = 64;

/// Output of PREPARE
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    /// Resolved session id
    pub session_id: String,
    /// Sanitized incoming messages, committed at the end of the turn
    pub incoming: Vec<Message>,
    /// Full backend request: system prompt, memory context, history, incoming
    pub messages: Vec<Message>,
}

/// Result of a completed turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    /// Session the turn ran against
    pub session_id: String,
    /// Role of the final reply
    pub role: Role,
    /// Text of the final reply
    pub content: String,
    /// Tool calls in the final reply, never executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Finalized record of a streaming turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnRecord {
    /// Session the turn ran against
    pub session_id: String,
    /// All fragments concatenated in order
    pub content: String,
}

/// Progress of a streaming turn
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// Messages prepared, the backend is about to be called
    Started {
        /// Resolved session id
        session_id: String,
    },
    /// One text fragment from the backend
    Delta(String),
    /// Stream complete and committed
    Finished(TurnRecord),
}

/// Runs conversation turns against a backend
///
/// # Examples
///
/// ```no_run
/// use agentd::agent::TurnOrchestrator;
/// use agentd::memory::MockMemory;
/// use agentd::prompts::PromptTemplates;
/// use agentd::providers::{Message, OllamaProvider};
/// use agentd::session::SessionStore;
/// use std::sync::Arc;
///
/// # async fn example() -> agentd::error::Result<()> {
/// let provider = OllamaProvider::new(Default::default())?;
/// let orchestrator = TurnOrchestrator::new(
///     Arc::new(provider),
///     Arc::new(MockMemory::new("/tmp/episodes".into())),
///     Arc::new(PromptTemplates::default()),
///     Arc::new(SessionStore::new("global")),
/// );
/// let reply = orchestrator.chat(None, &[Message::user("hi")], &[]).await?;
/// println!("{}", reply.content);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TurnOrchestrator {
    provider: Arc<dyn Provider>,
    memory: Arc<dyn MemoryProvider>,
    prompts: Arc<PromptTemplates>,
    sessions: Arc<SessionStore>,
    executor: Option<Arc<ToolExecutor>>,
    default_tools: Arc<Vec<ToolDescriptor>>,
    telemetry: TelemetryConfig,
}

impl TurnOrchestrator {
    /// Create an orchestrator without tool execution or default tools
    pub fn new(
        provider: Arc<dyn Provider>,
        memory: Arc<dyn MemoryProvider>,
        prompts: Arc<PromptTemplates>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            provider,
            memory,
            prompts,
            sessions,
            executor: None,
            default_tools: Arc::new(Vec::new()),
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Enable tool resolution through `executor`
    pub fn with_tool_executor(mut self, executor: Arc<ToolExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Tools offered to the backend when a caller declares none
    pub fn with_default_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.default_tools = Arc::new(tools);
        self
    }

    /// Set request telemetry options
    pub fn with_telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// The session store turns run against
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    fn effective_tools<'a>(&'a self, tools: &'a [ToolDescriptor]) -> &'a [ToolDescriptor] {
        if tools.is_empty() {
            &self.default_tools
        } else {
            tools
        }
    }

    /// Assemble the backend request for a turn without touching the session
    ///
    /// # Errors
    ///
    /// Returns error if the memory provider fails to produce context
    pub async fn prepare_messages(
        &self,
        session_id: Option<&str>,
        messages: &[Message],
    ) -> Result<PreparedTurn> {
        let handle = self.sessions.get_or_create(session_id);
        let session = handle.lock().await;
        self.prepare(&session, messages).await
    }

    async fn prepare(&self, session: &Session, messages: &[Message]) -> Result<PreparedTurn> {
        let incoming = sanitize(messages);

        let recent: Vec<Message> = session
            .messages()
            .iter()
            .chain(incoming.iter())
            .cloned()
            .collect();
        let recent = &recent[recent.len().saturating_sub(MEMORY_WINDOW)..];
        let context = self.memory.retrieve_context(&session.id, recent).await?;

        let mut final_messages = Vec::with_capacity(2 + session.len() + incoming.len());
        final_messages.push(Message::system(self.prompts.build_system_prompt()));
        final_messages.push(Message::system(context));
        final_messages.extend(sanitize(session.messages()));
        final_messages.extend(incoming.iter().cloned());

        Ok(PreparedTurn {
            session_id: session.id.clone(),
            incoming,
            messages: final_messages,
        })
    }

    /// Run one synchronous turn
    ///
    /// # Errors
    ///
    /// Returns error if the backend or memory provider fails; the session is
    /// left unchanged in that case
    pub async fn chat(
        &self,
        session_id: Option<&str>,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<TurnReply> {
        let handle = self.sessions.get_or_create(session_id);
        let mut session = handle.lock().await;

        let prepared = self.prepare(&session, messages).await?;
        let tools = self.effective_tools(tools);
        self.log_request(&prepared);

        let first = self
            .provider
            .complete(&prepared.messages, tools)
            .await?
            .message;
        let followup = self.resolve(&prepared.messages, &first, tools).await?;
        let reply = followup.as_ref().unwrap_or(&first);
        self.log_reply(&prepared.session_id, reply.text());

        self.memory
            .append(&prepared.session_id, Role::Assistant, reply.text())
            .await?;

        let history_before = session.len();
        session.extend(prepared.incoming);
        if !first.is_blank() {
            session.push(Message {
                role: Role::Assistant,
                content: first.content.clone(),
                tool_calls: first.tool_calls.clone(),
                tool_call_id: None,
            });
        }
        if let Some(followup) = &followup {
            if !followup.is_blank() {
                session.push(Message::assistant(followup.text()));
            }
        }
        debug!(
            "Committed {} messages to session {}",
            session.len() - history_before,
            prepared.session_id
        );

        Ok(TurnReply {
            session_id: prepared.session_id,
            role: reply.role,
            content: reply.text().to_string(),
            tool_calls: reply.tool_calls.clone(),
        })
    }

    /// Execute the tool calls in `first` and request a follow-up completion
    ///
    /// Returns `None` when there is nothing to resolve.
    async fn resolve(
        &self,
        request: &[Message],
        first: &Message,
        tools: &[ToolDescriptor],
    ) -> Result<Option<Message>> {
        let executor = match &self.executor {
            Some(executor) if !first.calls().is_empty() => executor,
            _ => return Ok(None),
        };

        let results = executor.execute_batch(first.calls()).await;

        let mut followup = request.to_vec();
        followup.push(Message::assistant_with_tools(
            first.content.clone(),
            first.calls().to_vec(),
        ));
        followup.extend(results.iter().map(|result| result.to_message()));

        let response = self.provider.complete(&followup, tools).await?;
        Ok(Some(response.message))
    }

    /// Run one streaming turn
    ///
    /// Events arrive as `Started`, any number of `Delta`, then `Finished`.
    /// A failure ends the stream with a single `Err`. Dropping the stream
    /// abandons the turn without committing anything.
    pub fn chat_stream(
        &self,
        session_id: Option<String>,
        messages: Vec<Message>,
        tools: Vec<ToolDescriptor>,
    ) -> ReceiverStream<Result<TurnEvent>> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let orchestrator = self.clone();

        tokio::spawn(async move {
            let outcome = orchestrator
                .run_stream(session_id.as_deref(), &messages, &tools, &tx)
                .await;
            if let Err(e) = outcome {
                debug!("Streaming turn failed: {}", e);
                let _ = tx.send(Err(e)).await;
            }
        });

        ReceiverStream::new(rx)
    }

    async fn run_stream(
        &self,
        session_id: Option<&str>,
        messages: &[Message],
        tools: &[ToolDescriptor],
        tx: &mpsc::Sender<Result<TurnEvent>>,
    ) -> Result<()> {
        let handle = self.sessions.get_or_create(session_id);
        let mut session = handle.lock().await;

        let prepared = self.prepare(&session, messages).await?;
        self.log_request(&prepared);

        let started = TurnEvent::Started {
            session_id: prepared.session_id.clone(),
        };
        if tx.send(Ok(started)).await.is_err() {
            return Ok(());
        }

        let mut fragments = self
            .provider
            .complete_stream(&prepared.messages, self.effective_tools(tools))
            .await?;

        let mut accumulated = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            accumulated.push_str(&fragment);
            if tx.send(Ok(TurnEvent::Delta(fragment))).await.is_err() {
                debug!(
                    "Stream consumer for session {} disconnected, discarding {} chars",
                    prepared.session_id,
                    accumulated.len()
                );
                return Ok(());
            }
        }
        self.log_reply(&prepared.session_id, &accumulated);

        self.memory
            .append(&prepared.session_id, Role::Assistant, &accumulated)
            .await?;
        session.extend(prepared.incoming);
        if !accumulated.trim().is_empty() {
            session.push(Message::assistant(accumulated.clone()));
        }

        let record = TurnRecord {
            session_id: prepared.session_id,
            content: accumulated,
        };
        let _ = tx.send(Ok(TurnEvent::Finished(record))).await;
        Ok(())
    }

    /// Append caller messages to a session outside of a turn
    ///
    /// System messages are dropped. Text content is mirrored to memory.
    /// Returns the resolved session id.
    ///
    /// # Errors
    ///
    /// Returns error if the memory provider fails
    pub async fn commit_user_messages(
        &self,
        session_id: Option<&str>,
        messages: &[Message],
    ) -> Result<String> {
        let handle = self.sessions.get_or_create(session_id);
        let mut session = handle.lock().await;

        let sanitized = strip_system(messages);
        for message in &sanitized {
            if let Some(content) = &message.content {
                self.memory.append(&session.id, message.role, content).await?;
            }
        }
        session.extend(sanitized);
        Ok(session.id.clone())
    }

    /// Append an assistant message to a session outside of a turn
    ///
    /// Returns the resolved session id.
    ///
    /// # Errors
    ///
    /// Returns error if the memory provider fails
    pub async fn commit_assistant_message(
        &self,
        session_id: Option<&str>,
        content: &str,
        tool_calls: Option<Vec<ToolCall>>,
    ) -> Result<String> {
        let handle = self.sessions.get_or_create(session_id);
        let mut session = handle.lock().await;

        self.memory
            .append(&session.id, Role::Assistant, content)
            .await?;
        session.push(Message {
            role: Role::Assistant,
            content: Some(content.to_string()),
            tool_calls,
            tool_call_id: None,
        });
        Ok(session.id.clone())
    }

    fn preview(&self, content: &str, limit: usize) -> String {
        if self.telemetry.debug_full_messages {
            content.to_string()
        } else {
            content.chars().take(limit).collect()
        }
    }

    fn log_request(&self, prepared: &PreparedTurn) {
        if !self.telemetry.debug_requests {
            return;
        }
        let summary: Vec<String> = prepared
            .messages
            .iter()
            .map(|m| match &m.content {
                Some(content) => format!("{}: {}", m.role, self.preview(content, MESSAGE_PREVIEW_CHARS)),
                None => format!("{}: [non-text]", m.role),
            })
            .collect();
        debug!(
            "Final request for session {} ({} messages): {:?}",
            prepared.session_id,
            prepared.messages.len(),
            summary
        );
    }

    fn log_reply(&self, session_id: &str, content: &str) {
        if !self.telemetry.debug_requests {
            return;
        }
        info!(
            "Reply for session {} ({} chars): {}",
            session_id,
            content.len(),
            self.preview(content, REPLY_PREVIEW_CHARS)
        );
    }
}
