//! presscache - caching proxy for a token-authenticated content API.
//!
//! Logs in once, keeps the bearer token alive, and serves content pages from
//! the upstream, falling back to the last good copy when the upstream fails.

mod cli;
mod logging;
mod token;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use presscache_core::Config;
use presscache_server::{build_cache, open_session, router, AppState};
use tracing::info;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Token(args) => {
            let _guard = logging::init_tracing(None)?;
            token::run(&config, args).await
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    let _guard = logging::init_tracing(config.log_dir.as_deref())?;
    info!(api_host = %config.api_host, "presscache starting");

    let cache = Arc::new(build_cache(&config)?);
    open_session(cache.session(), config.auth_key.as_deref()).await;

    let app = router(AppState { cache });
    let listener = tokio::net::TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(addr = %config.server.bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("presscache stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
