//! Client for the central registry service.
//!
//! Owns the API key lifecycle: load from disk, request from central when
//! absent, and refresh-then-retry exactly once when central rejects the
//! credentials. The register/update split mirrors the central contract:
//! update before register comes back 404, at which point the client falls
//! back to a registration.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::credentials;
use crate::identity::MachineIdentity;
use crate::metrics::MetricsSnapshot;
use crate::probes::HealthCheckResult;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no api key available")]
    NoKey,
    #[error("central rejected the api key")]
    AuthRejected,
    #[error("central is rate limiting this machine")]
    RateLimited,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected status {0} from central")]
    Unexpected(u16),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportPayload<'a> {
    pc_id: &'a str,
    system_info: &'a MachineIdentity,
    metrics: &'a MetricsSnapshot,
    health_results: &'a [HealthCheckResult],
    timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyResponse {
    pc_id: String,
    api_key: String,
}

pub struct CentralClient {
    http: reqwest::Client,
    base_url: String,
    identity: MachineIdentity,
    key_path: PathBuf,
    api_key: Option<String>,
    registered: bool,
    connected: Arc<AtomicBool>,
}

impl CentralClient {
    pub fn new(
        base_url: String,
        identity: MachineIdentity,
        key_path: PathBuf,
        connected: Arc<AtomicBool>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url,
            identity,
            key_path,
            api_key: None,
            registered: false,
            connected,
        })
    }

    /// Sends the current state to central. Any failure leaves the agent
    /// unauthenticated or unreported for this cycle only; the caller retries
    /// on its next natural interval.
    pub async fn report(
        &mut self,
        metrics: &MetricsSnapshot,
        results: &[HealthCheckResult],
    ) -> Result<(), ReportError> {
        let outcome = self.report_inner(metrics, results).await;
        self.connected.store(outcome.is_ok(), Ordering::Relaxed);
        outcome
    }

    async fn report_inner(
        &mut self,
        metrics: &MetricsSnapshot,
        results: &[HealthCheckResult],
    ) -> Result<(), ReportError> {
        self.ensure_key().await?;
        match self.send_report(metrics, results).await {
            Err(ReportError::AuthRejected) => {
                // key revoked or central restarted: fresh key, retry once
                warn!("central rejected api key, requesting a fresh one");
                self.api_key = None;
                self.registered = false;
                self.request_api_key().await?;
                self.send_report(metrics, results).await
            }
            other => other,
        }
    }

    async fn ensure_key(&mut self) -> Result<(), ReportError> {
        if self.api_key.is_some() {
            return Ok(());
        }
        match credentials::load_api_key(&self.key_path).await {
            Ok(Some(key)) => {
                debug!("loaded api key from {}", self.key_path.display());
                self.api_key = Some(key);
                Ok(())
            }
            Ok(None) => self.request_api_key().await,
            Err(e) => {
                warn!("could not read key file ({e}), requesting a new key");
                self.request_api_key().await
            }
        }
    }

    async fn request_api_key(&mut self) -> Result<(), ReportError> {
        let url = format!("{}/api/generate-key", self.base_url);
        let body = json!({
            "pcId": self.identity.pc_id,
            "systemInfo": self.identity,
        });
        let res = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReportError::Transport(e.to_string()))?;
        if !res.status().is_success() {
            return Err(ReportError::Unexpected(res.status().as_u16()));
        }
        let key: KeyResponse = res
            .json()
            .await
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        if let Err(e) = credentials::save_api_key(&self.key_path, &key.api_key).await {
            warn!("failed to persist api key: {e}");
        }
        info!(pc_id = %key.pc_id, "obtained api key from central");
        self.api_key = Some(key.api_key);
        Ok(())
    }

    async fn send_report(
        &mut self,
        metrics: &MetricsSnapshot,
        results: &[HealthCheckResult],
    ) -> Result<(), ReportError> {
        let api_key = self.api_key.clone().ok_or(ReportError::NoKey)?;

        // two passes at most: an update that comes back 404 falls back to a
        // registration within the same cycle
        for _ in 0..2 {
            let was_update = self.registered;
            let path = if was_update { "/api/update" } else { "/api/register" };
            let payload = ReportPayload {
                pc_id: &self.identity.pc_id,
                system_info: &self.identity,
                metrics,
                health_results: results,
                timestamp: Utc::now().to_rfc3339(),
            };

            let res = self
                .http
                .post(format!("{}{path}", self.base_url))
                .header("X-API-Key", &api_key)
                .header("X-PC-ID", &self.identity.pc_id)
                .json(&payload)
                .send()
                .await
                .map_err(|e| ReportError::Transport(e.to_string()))?;

            let status = res.status();
            if status.is_success() {
                self.registered = true;
                debug!(%path, "report delivered");
                return Ok(());
            }
            match status.as_u16() {
                401 | 403 => return Err(ReportError::AuthRejected),
                404 if was_update => {
                    info!("central does not know this machine, re-registering");
                    self.registered = false;
                }
                429 => return Err(ReportError::RateLimited),
                code => return Err(ReportError::Unexpected(code)),
            }
        }
        Err(ReportError::Unexpected(404))
    }
}
