// =============================================================================
// RSI Grid — Main Entry Point
// =============================================================================
//
// Polls Binance klines for every configured symbol on a fixed cadence,
// computes RSI and SMA-of-RSI per symbol, and serves the results to the
// dashboard over REST and WebSocket.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod indicators;
mod market_data;
mod runtime_config;
mod types;

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::{BinanceClient, RateLimitTracker};
use crate::runtime_config::{normalize_symbols, RuntimeConfig, CONFIG_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("RSI Grid starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override symbols / timeframe from env if available.
    if let Ok(syms) = std::env::var("RSI_GRID_SYMBOLS") {
        config.symbols = normalize_symbols(syms.split(','));
    }
    if let Ok(tf) = std::env::var("RSI_GRID_TIMEFRAME") {
        match tf.parse() {
            Ok(timeframe) => config.timeframe = timeframe,
            Err(e) => warn!(error = %e, "Ignoring RSI_GRID_TIMEFRAME"),
        }
    }

    if let Err(e) = config.validate() {
        warn!(error = %e, "Invalid runtime config, using defaults");
        config = RuntimeConfig::default();
    }

    info!(
        symbols = config.symbols.len(),
        timeframe = %config.timeframe,
        rsi_period = config.indicators.rsi_period,
        sma_period = config.indicators.sma_period,
        display_limit = config.indicators.display_limit,
        poll_interval_secs = config.poll_interval_secs,
        "Configuration ready"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let rate_limits = Arc::new(RateLimitTracker::new());
    let admin_token = std::env::var("RSI_GRID_ADMIN_TOKEN").ok();
    if admin_token.as_deref().map_or(true, str::is_empty) {
        warn!("RSI_GRID_ADMIN_TOKEN not set — configuration endpoints are disabled");
    }
    let state = Arc::new(
        AppState::new(config, rate_limits.clone())
            .with_config_path(CONFIG_PATH)
            .with_admin_token(admin_token),
    );

    // ── 3. Candle source & poller ────────────────────────────────────────
    let client = BinanceClient::new(rate_limits)?;
    tokio::spawn(market_data::run_poller(client, state.clone()));

    // ── 4. API server ────────────────────────────────────────────────────
    let bind_addr =
        std::env::var("RSI_GRID_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    let config = state.runtime_config.read().clone();
    if let Err(e) = config.save(&state.config_path) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("RSI Grid shut down complete.");
    Ok(())
}
