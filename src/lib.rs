//! agentd - conversational agent gateway library
//!
//! This library provides the core of agentd: session state, the turn
//! orchestrator, backend adapters, tool execution, memory and prompts,
//! plus the HTTP gateway and terminal front ends built on top of them.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `agent`: Turn orchestration and message sanitization
//! - `session`: Process-wide session store
//! - `providers`: Chat backend abstraction and the Ollama implementation
//! - `tools`: Tool descriptors, registry, executor and built-in tools
//! - `memory`: Memory provider contract and the mock store
//! - `prompts`: System prompt fragments and user templates
//! - `runtime`: Composition root owning every component
//! - `server`: OpenAI-compatible HTTP gateway
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use agentd::{AgentRuntime, Config};
//! use agentd::providers::Message;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let runtime = AgentRuntime::new(config).await?;
//!     let reply = runtime.chat(None, &[Message::user("hi")], &[]).await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod memory;
pub mod prompts;
pub mod providers;
pub mod runtime;
pub mod server;
pub mod session;
pub mod tools;

// Re-export commonly used types
pub use agent::{TurnOrchestrator, TurnReply};
pub use config::Config;
pub use error::{AgentdError, Result};
pub use runtime::{AgentRuntime, RuntimeStatus};
pub use session::SessionStore;

#[cfg(test)]
pub mod test_utils;
