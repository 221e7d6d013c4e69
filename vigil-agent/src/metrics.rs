//! Process-local counters and the per-cycle metrics snapshot.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use sysinfo::System;

/// Counters incremented from the check and report loops. Shared with the
/// local diagnostic server, hence atomics.
#[derive(Debug)]
pub struct AgentCounters {
    alerts: AtomicU64,
    requests: AtomicU64,
    errors: AtomicU64,
    started: Instant,
}

/// Point-in-time metrics, recomputed each report cycle.
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

impl AgentCounters {
    pub fn new() -> Self {
        Self {
            alerts: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_alert(&self) {
        self.alerts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn alerts(&self) -> u64 {
        self.alerts.load(Ordering::Relaxed)
    }

    /// Snapshot of the counters plus fresh system readings. CPU usage needs
    /// two refreshes with a pause in between to produce a real delta.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let mut sys = System::new_all();
        sys.refresh_all();
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        sys.refresh_cpu_usage();

        let cpu_load = sys.global_cpu_info().cpu_usage();
        let total = sys.total_memory();
        let memory_usage_percent = if total > 0 {
            ((total - sys.available_memory()) as f32 / total as f32) * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            alerts: self.alerts.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            uptime_ms: self.started.elapsed().as_millis() as u64,
            cpu_load,
            memory_usage_percent,
        }
    }
}

impl Default for AgentCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_reflects_counters() {
        let counters = AgentCounters::new();
        counters.record_alert();
        counters.record_alert();
        counters.record_request();
        counters.record_error();

        let snapshot = counters.snapshot().await;
        assert_eq!(snapshot.alerts, 2);
        assert_eq!(snapshot.requests, 1);
        assert_eq!(snapshot.errors, 1);
        assert!(snapshot.memory_usage_percent >= 0.0);
        assert!(snapshot.memory_usage_percent <= 100.0);
    }
}
