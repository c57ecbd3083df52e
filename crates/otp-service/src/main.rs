//! # OTP Service
//!
//! Issues six-digit one-time codes for (user, offer) pairs, verifies them
//! and confirms the transaction with a downstream service on success.
//!
//! ## Architecture
//! ```text
//! Client → OTP Service → Confirmation API
//!               ↓
//!          Redis (State)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod gateway;
mod otp;
mod routes;
mod state;
mod store;

use crate::config::{AppConfig, StoreBackend};
use crate::state::AppState;

/// OTP Service - one-time code lifecycle engine
#[derive(Parser, Debug)]
#[command(name = "otp-service")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/otp-service.toml")]
    config: String,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Confirmation service base URL (overrides config)
    #[arg(long, env = "OTP_CONFIRMATION_API_URL")]
    confirmation_url: Option<String>,

    /// Store backend (overrides config)
    #[arg(long, value_enum, env = "OTP_STORE")]
    store: Option<StoreBackend>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before clap reads the environment
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("🔐 Starting OTP Service v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    let policy = config.otp.policy();
    info!(
        ttl_secs = policy.ttl.as_secs(),
        max_retries = policy.max_retries,
        max_resends = policy.max_resends,
        resend_window_secs = policy.resend_window.as_secs(),
        store = ?config.store,
        "OTP policy"
    );

    let state = AppState::new(&config)
        .await
        .context("Failed to initialize application state")?;

    let app = routes::create_router(state, config.request_timeout());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🚀 OTP Service listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("👋 OTP Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
