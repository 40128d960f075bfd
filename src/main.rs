//! agentd - conversational agent gateway
//!
#![doc = "agentd - conversational agent gateway"]
#![doc = "Main entry point for the agentd service."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agentd::cli::{Cli, Commands};
use agentd::commands;
use agentd::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting HTTP gateway");
            commands::run_serve(config).await
        }
        Commands::Repl => {
            tracing::info!("Starting interactive REPL");
            commands::repl::run_repl(config).await
        }
        Commands::Status => commands::run_status(config).await,
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "agentd=debug" } else { "agentd=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
