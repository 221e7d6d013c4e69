//! Vigil agent - per-machine health monitor.
//!
//! Probes configured endpoints, keeps process-local metrics, reports state
//! to the central service with bounded retry, and serves a local diagnostic
//! HTTP surface that works with or without central connectivity.

mod central;
mod config;
mod credentials;
mod identity;
mod logging;
mod metrics;
mod probes;
mod server;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::central::CentralClient;
use crate::config::AgentConfig;
use crate::identity::MachineIdentity;
use crate::metrics::AgentCounters;
use crate::probes::HealthChecker;
use crate::server::LocalState;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cfg = AgentConfig::from_env()?;
    let identity = MachineIdentity::discover();
    info!(
        pc_id = %identity.pc_id,
        central = %cfg.central_url,
        endpoints = cfg.endpoints.len(),
        "starting agent"
    );

    let counters = Arc::new(AgentCounters::new());
    let connected = Arc::new(AtomicBool::new(false));
    let checker =
        HealthChecker::new(cfg.endpoints.clone()).context("failed to build probe client")?;
    let key_path = credentials::default_key_path()?;
    let mut client = CentralClient::new(
        cfg.central_url.clone(),
        identity.clone(),
        key_path,
        connected.clone(),
    )
    .context("failed to build central client")?;

    // local diagnostic surface, independent of central reachability
    let local = Arc::new(LocalState::new(
        identity,
        counters.clone(),
        connected.clone(),
    ));
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind local server on {addr}"))?;
    info!("local diagnostics on http://{addr}");
    let app = server::build_router(local.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("local server stopped: {e}");
        }
    });

    // Delay keeps the loops self-scheduling: the next run is planned only
    // after the current one completes, so a slow cycle never bursts.
    let mut check_timer = interval(Duration::from_secs(cfg.check_interval_secs.max(1)));
    check_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut report_timer = interval(Duration::from_secs(cfg.report_interval_secs.max(1)));
    report_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = check_timer.tick() => {
                let results = checker.run_all(&counters).await;
                debug!(count = results.len(), "health checks finished");
                local.store_results(results);
            }

            _ = report_timer.tick() => {
                counters.record_request();
                let snapshot = counters.snapshot().await;
                let results = local.latest_results();
                match client.report(&snapshot, &results).await {
                    Ok(()) => debug!("report delivered to central"),
                    Err(e) => {
                        counters.record_error();
                        warn!("report failed: {e}");
                    }
                }
            }
        }
    }
}
