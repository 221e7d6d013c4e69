//! Endpoint health probes.
//!
//! A probe never fails the caller: every transport problem (DNS, connect,
//! timeout, non-2xx) is folded into a [`HealthCheckResult`] value with the
//! elapsed time attached.

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::EndpointConfig;
use crate::metrics::AgentCounters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    pub name: String,
    pub status: ProbeStatus,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

pub struct HealthChecker {
    http: reqwest::Client,
    endpoints: Vec<EndpointConfig>,
}

impl HealthChecker {
    pub fn new(endpoints: Vec<EndpointConfig>) -> anyhow::Result<Self> {
        // per-request timeouts come from each endpoint config
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, endpoints })
    }

    /// Probes one endpoint with its configured timeout.
    pub async fn check(&self, endpoint: &EndpointConfig) -> HealthCheckResult {
        let started = Instant::now();
        let response = self
            .http
            .get(&endpoint.url)
            .timeout(Duration::from_millis(endpoint.timeout_ms))
            .send()
            .await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let (status, error) = match response {
            Ok(res) if res.status().is_success() => (ProbeStatus::Healthy, None),
            Ok(res) => (
                ProbeStatus::Error,
                Some(format!("unexpected status {}", res.status())),
            ),
            Err(e) => (ProbeStatus::Error, Some(e.to_string())),
        };

        debug!(name = %endpoint.name, ?status, response_time_ms, "probe finished");

        HealthCheckResult {
            name: endpoint.name.clone(),
            status,
            response_time_ms,
            error,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Probes every configured endpoint concurrently (fan-out equals the
    /// endpoint count) and returns results in configuration order. Each
    /// failing result bumps the alert counter.
    pub async fn run_all(&self, counters: &AgentCounters) -> Vec<HealthCheckResult> {
        let results = join_all(self.endpoints.iter().map(|e| self.check(e))).await;
        for result in &results {
            if result.status == ProbeStatus::Error {
                counters.record_alert();
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{http::StatusCode, Router};

    async fn spawn_target() -> String {
        let app = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn endpoint(name: &str, url: String) -> EndpointConfig {
        EndpointConfig {
            name: name.to_string(),
            url,
            timeout_ms: 2000,
        }
    }

    #[tokio::test]
    async fn classifies_success_and_failure() {
        let base = spawn_target().await;
        let checker = HealthChecker::new(vec![
            endpoint("up", format!("{base}/ok")),
            endpoint("down", format!("{base}/broken")),
        ])
        .unwrap();
        let counters = AgentCounters::new();

        let results = checker.run_all(&counters).await;
        assert_eq!(results.len(), 2);
        // configuration order preserved
        assert_eq!(results[0].name, "up");
        assert_eq!(results[0].status, ProbeStatus::Healthy);
        assert!(results[0].error.is_none());
        assert_eq!(results[1].status, ProbeStatus::Error);
        assert!(results[1].error.as_deref().unwrap().contains("500"));
        assert_eq!(counters.alerts(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_becomes_error_value() {
        // nothing listens on port 1
        let checker = HealthChecker::new(vec![endpoint(
            "nowhere",
            "http://127.0.0.1:1/health".to_string(),
        )])
        .unwrap();
        let counters = AgentCounters::new();

        let results = checker.run_all(&counters).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ProbeStatus::Error);
        assert!(results[0].error.is_some());
        assert_eq!(counters.alerts(), 1);
    }

    #[tokio::test]
    async fn empty_endpoint_list_is_a_noop() {
        let checker = HealthChecker::new(Vec::new()).unwrap();
        let counters = AgentCounters::new();
        assert!(checker.run_all(&counters).await.is_empty());
        assert_eq!(counters.alerts(), 0);
    }
}
