//! dcmp-ai - Composition Generation Service
//!
//! Drives an external text-generation service to produce a song Plan and
//! per-instrument Tracks, exposed to the desktop host as HTTP commands.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dcmp_ai::client::HttpCompletionClient;
use dcmp_ai::{AppState, Composer, ComposerSettings};
use dcmp_common::config::{load_config, resolve_initial_api_key};
use dcmp_common::CredentialStore;

#[derive(Parser, Debug)]
#[command(name = "dcmp-ai")]
#[command(about = "Composition generation service")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long, env = "DCMP_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "DCMP_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_source) =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;

    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "dcmp_ai={level},dcmp_common={level},tower_http={level}"
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dcmp-ai (Composition Generation) service");
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_source {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file found, using built-in defaults"),
    }
    info!(
        provider = %config.provider.name,
        base_url = %config.provider.base_url,
        model = %config.provider.model,
        revision_policy = ?config.generation.revision_policy,
        "Generation provider configured"
    );

    let credentials = CredentialStore::new();
    if let Some((key, source)) = resolve_initial_api_key(&config) {
        credentials.set(&config.provider.name, key).await;
        info!("Initial API key loaded from {}", source);
    } else {
        info!("No initial API key; waiting for set_api_key / validate_api_key");
    }

    let client = HttpCompletionClient::new(&config.provider)
        .context("Failed to build generation client")?;
    let composer = Composer::new(
        Arc::new(client),
        credentials,
        ComposerSettings::from_config(&config),
    );

    let app = dcmp_ai::build_router(AppState::new(composer));

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
