mod ai_engine;
mod clock;
mod config;
mod credits;
mod db;
mod diffusion;
mod errors;
mod models;
mod routes;
mod settings;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai_engine::mock::MockAiEngine;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::credits::ledger::PgCreditLedger;
use crate::db::create_pool;
use crate::diffusion::audience::PgAudienceEstimator;
use crate::diffusion::store::PgCampaignStore;
use crate::routes::build_router;
use crate::settings::service::DiffusionConfig;
use crate::settings::store::PgSettingsStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Marketplace API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.database_max_connections).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Settings and pricing are cached for SETTINGS_CACHE_TTL_SECS
    let diffusion = Arc::new(DiffusionConfig::new(
        Arc::new(PgSettingsStore::new(db.clone())),
        clock.clone(),
        chrono::Duration::seconds(config.settings_cache_ttl_secs as i64),
        config.default_payment_number.clone(),
        config.currency.clone(),
    ));
    info!(
        "Diffusion settings cache TTL: {}s",
        config.settings_cache_ttl_secs
    );

    // No live model is wired; AI features run against the deterministic engine
    let ai_engine = Arc::new(MockAiEngine);
    info!("AI engine initialized (mock)");

    // Build app state
    let state = AppState {
        campaigns: Arc::new(PgCampaignStore::new(db.clone())),
        audience: Arc::new(PgAudienceEstimator::new(db.clone())),
        diffusion,
        ledger: Arc::new(PgCreditLedger::new(db)),
        ai_engine,
        clock,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
