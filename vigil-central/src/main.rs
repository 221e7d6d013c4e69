//! Vigil central service - registry and authentication for monitoring agents.
//!
//! Accepts authenticated registration/update traffic from agents, maintains
//! an in-memory directory of machine state with staleness eviction, issues
//! and validates per-machine API keys, rate-limits callers and serves the
//! read APIs plus an HTML dashboard. All state is memory-resident; a restart
//! starts from empty maps and agents re-bootstrap themselves.

mod config;
mod dashboard;
mod error;
mod http;
mod keys;
mod logging;
mod models;
mod ratelimit;
mod registry;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::CentralConfig;
use crate::http::AppState;
use crate::keys::ApiKeyStore;
use crate::ratelimit::RateLimiter;
use crate::registry::Registry;
use crate::state::new_state;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cfg = CentralConfig::from_env()?;
    info!(
        port = cfg.port,
        quota = cfg.rate_limit_quota,
        stale_timeout_secs = cfg.stale_timeout_secs,
        "starting central service"
    );

    let registry = new_state(Registry::new(
        Duration::from_secs(cfg.stale_timeout_secs),
        Duration::from_secs(cfg.online_window_secs),
        Duration::from_secs(cfg.housekeeping_interval_secs),
    ));
    let keys = new_state(ApiKeyStore::new());
    let limiter = new_state(RateLimiter::new(
        cfg.rate_limit_quota,
        Duration::from_secs(cfg.rate_limit_window_secs),
    ));

    let app_state = AppState {
        registry,
        keys,
        limiter,
        cors: cfg.cors.clone(),
        started_at: Instant::now(),
    };

    let app = http::build_router(app_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("central service listening on http://{addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
