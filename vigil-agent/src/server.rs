//! Local diagnostic HTTP surface.
//!
//! Serves in-memory state only and never talks to the network, so it stays
//! available even when the central service is unreachable.

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::identity::MachineIdentity;
use crate::metrics::{AgentCounters, MetricsSnapshot};
use crate::probes::{HealthCheckResult, ProbeStatus};

pub struct LocalState {
    identity: MachineIdentity,
    counters: Arc<AgentCounters>,
    connected: Arc<AtomicBool>,
    last_results: Mutex<Vec<HealthCheckResult>>,
}

impl LocalState {
    pub fn new(
        identity: MachineIdentity,
        counters: Arc<AgentCounters>,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            identity,
            counters,
            connected,
            last_results: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the retained probe results; only the latest set is kept.
    pub fn store_results(&self, results: Vec<HealthCheckResult>) {
        *self.last_results.lock().expect("results lock poisoned") = results;
    }

    pub fn latest_results(&self) -> Vec<HealthCheckResult> {
        self.last_results
            .lock()
            .expect("results lock poisoned")
            .clone()
    }

    pub fn central_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

pub fn build_router(state: Arc<LocalState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/system", get(system))
        .route("/dashboard", get(dashboard))
        .route("/", get(dashboard))
        .with_state(state)
}

// GET /health
async fn health(State(state): State<Arc<LocalState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "pcId": state.identity.pc_id,
        "centralConnected": state.central_connected(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

// GET /metrics
async fn metrics(State(state): State<Arc<LocalState>>) -> Json<MetricsSnapshot> {
    Json(state.counters.snapshot().await)
}

// GET /system
async fn system(State(state): State<Arc<LocalState>>) -> Json<MachineIdentity> {
    Json(state.identity.clone())
}

// GET /dashboard, GET /
async fn dashboard(State(state): State<Arc<LocalState>>) -> Html<String> {
    let snapshot = state.counters.snapshot().await;
    let results = state.latest_results();
    Html(render_page(&state.identity, &snapshot, &results, state.central_connected()))
}

fn render_page(
    identity: &MachineIdentity,
    snapshot: &MetricsSnapshot,
    results: &[HealthCheckResult],
    connected: bool,
) -> String {
    let mut rows = String::new();
    if results.is_empty() {
        rows.push_str("<tr><td colspan=\"4\" class=\"muted\">No probes have run yet</td></tr>\n");
    }
    for result in results {
        let (class, label) = match result.status {
            ProbeStatus::Healthy => ("ok", "healthy"),
            ProbeStatus::Error => ("err", "error"),
        };
        rows.push_str(&format!(
            "<tr><td>{}</td><td class=\"{}\">{}</td><td>{} ms</td><td>{}</td></tr>\n",
            escape(&result.name),
            class,
            label,
            result.response_time_ms,
            escape(result.error.as_deref().unwrap_or("-")),
        ));
    }

    let central = if connected {
        "<span class=\"ok\">connected</span>"
    } else {
        "<span class=\"err\">unreachable</span>"
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta http-equiv="refresh" content="10">
    <title>Vigil agent - {pc_id}</title>
    <style>
        body {{ margin: 0; padding: 20px; background: #1a1a1a; color: #ccc;
               font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; }}
        h1 {{ font-size: 18px; }}
        .ok {{ color: #4caf50; }}
        .err {{ color: #e05c5c; }}
        .muted {{ color: #777; }}
        table {{ border-collapse: collapse; background: #252526; min-width: 480px; }}
        th, td {{ padding: 6px 12px; border-bottom: 1px solid #333; text-align: left; font-size: 13px; }}
        th {{ text-transform: uppercase; font-size: 11px; color: #888; }}
        p {{ font-size: 13px; }}
    </style>
</head>
<body>
<h1>Vigil agent &mdash; {pc_id}</h1>
<p>{platform} / {arch} &middot; {cores} cores &middot; {mem} MB &middot; pid {pid}</p>
<p>Central service: {central} &middot; uptime {uptime}s &middot;
   alerts {alerts} &middot; reports {requests} &middot; errors {errors} &middot;
   cpu {cpu:.1}% &middot; memory {memp:.1}%</p>
<table>
<tr><th>Probe</th><th>Status</th><th>Response</th><th>Error</th></tr>
{rows}</table>
</body>
</html>
"#,
        pc_id = escape(&identity.pc_id),
        platform = escape(&identity.platform),
        arch = escape(&identity.architecture),
        cores = identity.cpu_cores,
        mem = identity.total_memory_mb,
        pid = identity.pid,
        central = central,
        uptime = snapshot.uptime_ms / 1000,
        alerts = snapshot.alerts,
        requests = snapshot.requests,
        errors = snapshot.errors,
        cpu = snapshot.cpu_load,
        memp = snapshot.memory_usage_percent,
        rows = rows,
    )
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn spawn_local() -> (Arc<LocalState>, String) {
        let identity = MachineIdentity::discover();
        let state = Arc::new(LocalState::new(
            identity,
            Arc::new(AgentCounters::new()),
            Arc::new(AtomicBool::new(false)),
        ));
        let app = build_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (state, format!("http://{addr}"))
    }

    #[tokio::test]
    async fn health_is_served_without_central_connectivity() {
        let (_state, base) = spawn_local().await;
        let res = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["centralConnected"], Value::Bool(false));
        assert!(body["pcId"].as_str().unwrap().contains('@'));
    }

    #[tokio::test]
    async fn system_and_metrics_expose_local_state() {
        let (state, base) = spawn_local().await;
        state.counters.record_alert();

        let res = reqwest::get(format!("{base}/system")).await.unwrap();
        let body: Value = res.json().await.unwrap();
        assert!(body["pcId"].as_str().unwrap().contains('@'));
        assert!(body["cpuCores"].as_u64().unwrap() > 0);

        let res = reqwest::get(format!("{base}/metrics")).await.unwrap();
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["alerts"], Value::from(1));
    }

    #[tokio::test]
    async fn dashboard_shows_latest_results() {
        let (state, base) = spawn_local().await;
        state.store_results(vec![HealthCheckResult {
            name: "api".to_string(),
            status: ProbeStatus::Error,
            response_time_ms: 1234,
            error: Some("connect refused".to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }]);

        let res = reqwest::get(format!("{base}/dashboard")).await.unwrap();
        assert_eq!(res.status(), 200);
        let html = res.text().await.unwrap();
        assert!(html.contains("connect refused"));
        assert!(html.contains("1234 ms"));
        assert!(html.contains("unreachable"));
    }
}
