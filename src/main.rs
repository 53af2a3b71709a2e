// =============================================================================
// Signal Desk — Main Entry Point
// =============================================================================
//
// Serves the dashboard API: fetch candles from the exchange, compute the
// indicator snapshot, and ask the model gateway for a trading verdict.
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use signal_desk::api;
use signal_desk::app_state::AppState;
use signal_desk::market_data::BybitClient;
use signal_desk::runtime_config::RuntimeConfig;
use signal_desk::signal::GatewaySignalGenerator;

const DEFAULT_CONFIG_PATH: &str = "signal_desk.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Signal Desk — Starting Up                         ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("SIGNAL_DESK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();
    config.validate().context("invalid runtime config")?;

    info!(symbols = ?config.allowed_symbols, "Configured symbols");

    // ── 2. Collaborators ─────────────────────────────────────────────────
    let market = BybitClient::new(
        config.exchange_base_url.clone(),
        config.request_timeout(),
        config.retry.clone(),
    )?;

    let api_key = std::env::var("AI_GATEWAY_API_KEY").ok();
    let signals = GatewaySignalGenerator::new(
        config.gateway_url.clone(),
        config.model.clone(),
        api_key,
        config.gateway_timeout(),
        config.retry.clone(),
    )?
    .with_indicator_params(config.indicators.clone());

    info!(
        exchange = %config.exchange_base_url,
        model = %config.model,
        gateway_key = signals.has_api_key(),
        min_candles = config.indicators.min_candles(),
        "Upstreams configured"
    );

    // ── 3. Build shared state ────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, Arc::new(market), Arc::new(signals)));

    // ── 4. Start the API server ──────────────────────────────────────────
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    info!("Signal Desk shut down complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; serving until killed");
        std::future::pending::<()>().await;
    }
    warn!("Shutdown signal received — stopping gracefully");
}
