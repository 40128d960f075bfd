//! Command handlers for the CLI
//!
//! - `serve` - Run the HTTP gateway until Ctrl-C
//! - `repl` - Interactive terminal chat, gateway alongside
//! - `status` - Print the runtime status as JSON

use crate::config::Config;
use crate::error::Result;
use crate::runtime::AgentRuntime;
use crate::server;
use std::sync::Arc;

pub mod repl;

/// Run the HTTP gateway until Ctrl-C, then stop the runtime
pub async fn run_serve(config: Config) -> Result<()> {
    tracing::info!("Starting {}", config.agent.name);
    let runtime = Arc::new(AgentRuntime::new(config).await?);

    let served = server::serve(runtime.clone()).await;
    runtime.stop().await?;
    served
}

/// Print the status of a freshly built runtime
pub async fn run_status(config: Config) -> Result<()> {
    let runtime = AgentRuntime::new(config).await?;
    println!("{}", status_json(&runtime)?);
    runtime.stop().await
}

fn status_json(runtime: &AgentRuntime) -> Result<String> {
    Ok(serde_json::to_string_pretty(&runtime.status())?)
}
