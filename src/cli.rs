//! Command-line interface definition for agentd
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to serve the HTTP gateway, chat from a terminal,
//! and print runtime status.

use clap::{Parser, Subcommand};

/// agentd - conversational agent gateway
///
/// Serves an OpenAI-compatible chat API backed by a local model, with
/// per-session memory and tool calling.
#[derive(Parser, Debug, Clone)]
#[command(name = "agentd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "AGENT_CONFIG", default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for agentd
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Address to bind (overrides api.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides api.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the agent from the terminal
    Repl,

    /// Print runtime status as JSON
    Status,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
