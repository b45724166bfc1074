//! Sahayak - multilingual AI chat assistant backend
//!
//! Main entry point for the Sahayak server.

use std::net::SocketAddr;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sahayak::cli::{Cli, Commands};
use sahayak::config::Config;
use sahayak::server::{self, AppState};

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

    if config.provider.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; chat requests will fail");
    }

    match cli.command {
        Commands::Serve { .. } => {
            let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

            let state = AppState::from_config(config)?;

            let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl-C, shutting down");
                    let _ = shutdown_tx.send(());
                }
            });

            server::run_server(state, addr, shutdown_rx).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "sahayak=debug" } else { "sahayak=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
