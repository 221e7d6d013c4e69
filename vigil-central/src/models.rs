//! Wire payloads and registry entry shapes.
//!
//! Field names follow the agent protocol (camelCase on the wire). The
//! serialize side of these structs lives in `vigil-agent`; the two halves are
//! kept in sync by the integration tests.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

/// Static machine facts, computed once per agent process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub pc_id: String,
    pub hostname: String,
    pub username: String,
    pub platform: String,
    pub architecture: String,
    pub cpu_cores: u32,
    pub total_memory_mb: u64,
    pub pid: u32,
    pub started_at: String,
    #[serde(default)]
    pub agent_version: Option<String>,
}

/// Process-local counters recomputed by the agent each report cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub alerts: u64,
    pub requests: u64,
    pub errors: u64,
    pub uptime_ms: u64,
    pub cpu_load: f32,
    pub memory_usage_percent: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Healthy,
    Error,
}

/// Outcome of one probe against one configured endpoint.
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateKeyRequest {
    pub pc_id: String,
    pub system_info: SystemInfo,
}

/// Full state snapshot sent on `POST /api/register`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub pc_id: String,
    pub system_info: SystemInfo,
    #[serde(default)]
    pub metrics: Option<MetricsSnapshot>,
    #[serde(default)]
    pub health_results: Vec<HealthCheckResult>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Partial state sent on `POST /api/update`; absent fields keep their
/// previous value (latest-wins merge).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    pub pc_id: String,
    #[serde(default)]
    pub system_info: Option<SystemInfo>,
    #[serde(default)]
    pub metrics: Option<MetricsSnapshot>,
    #[serde(default)]
    pub health_results: Option<Vec<HealthCheckResult>>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Registry state for one machine. Internal representation; the API exposes
/// [`RegistryEntryView`].
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub pc_id: String,
    pub system_info: SystemInfo,
    pub metrics: MetricsSnapshot,
    pub health_results: Vec<HealthCheckResult>,
    pub last_seen: OffsetDateTime,
    pub registered_at: OffsetDateTime,
    pub authenticated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntryView {
    pub pc_id: String,
    pub system_info: SystemInfo,
    pub metrics: MetricsSnapshot,
    pub health_results: Vec<HealthCheckResult>,
    pub last_seen: String,
    pub registered_at: String,
    pub authenticated: bool,
    pub online: bool,
    pub last_seen_seconds_ago: i64,
}

pub fn to_view(entry: &RegistryEntry, now: OffsetDateTime, online_window: Duration) -> RegistryEntryView {
    let age = now - entry.last_seen;
    RegistryEntryView {
        pc_id: entry.pc_id.clone(),
        system_info: entry.system_info.clone(),
        metrics: entry.metrics.clone(),
        health_results: entry.health_results.clone(),
        last_seen: entry.last_seen.format(&Rfc3339).unwrap_or_default(),
        registered_at: entry.registered_at.format(&Rfc3339).unwrap_or_default(),
        authenticated: entry.authenticated,
        online: age <= online_window,
        last_seen_seconds_ago: age.whole_seconds().max(0),
    }
}

/// Fold of the current registry contents, served on `GET /api/metrics`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total_machines: u32,
    pub online_machines: u32,
    pub total_alerts: u64,
    pub average_response_time: f64,
}
