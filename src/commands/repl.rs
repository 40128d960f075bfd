//! Interactive chat from the terminal
//!
//! Reads lines with rustyline and sends each as one turn on a fresh
//! session. The HTTP gateway runs alongside unless `api.enabled` is off.

use crate::config::Config;
use crate::error::Result;
use crate::providers::Message;
use crate::runtime::AgentRuntime;
use crate::server;
use colored::{Color, Colorize};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tokio::sync::oneshot;

const PROMPT: &str = "you> ";

/// Parse a configured accent color, magenta when unrecognized
fn accent_color(name: &str) -> Color {
    name.parse().unwrap_or(Color::Magenta)
}

/// Start the interactive loop
///
/// Exits on Ctrl-C or Ctrl-D, then stops the gateway and the runtime.
pub async fn run_repl(config: Config) -> Result<()> {
    let runtime = Arc::new(AgentRuntime::new(config).await?);
    let accent = accent_color(&runtime.config().agent.color);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let gateway = if runtime.config().api.enabled {
        let listener = server::bind(&runtime.config().api).await?;
        Some(tokio::spawn(server::serve_with_shutdown(
            runtime.clone(),
            listener,
            async move {
                let _ = shutdown_rx.await;
            },
        )))
    } else {
        None
    };

    let (session_id, _) = runtime.sessions().new_session();
    tracing::debug!("REPL session {}", session_id);

    let mut rl = DefaultEditor::new()?;
    println!(
        "{} REPL. Type your message, Ctrl+C to exit.",
        runtime.config().agent.name.color(accent).bold()
    );

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                match runtime
                    .chat(Some(&session_id), &[Message::user(input)], &[])
                    .await
                {
                    Ok(reply) => println!("{} {}", "agent>".color(accent).bold(), reply.content),
                    Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    println!("\nShutting down...");
    let _ = shutdown_tx.send(());
    if let Some(gateway) = gateway {
        match gateway.await {
            Ok(served) => served?,
            Err(e) => tracing::warn!("Gateway task failed: {}", e),
        }
    }
    runtime.stop().await
}
