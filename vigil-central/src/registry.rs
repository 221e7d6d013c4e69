//! In-memory directory of machine state keyed by pcId.
//!
//! Entries are created by `register`, merged by `update` (latest-wins per
//! field) and removed lazily: reads trigger an eviction sweep at most once
//! per housekeeping interval, dropping entries whose `last_seen` exceeds the
//! staleness timeout. The `online` flag on views uses a separate, shorter
//! freshness window; an offline machine can linger for a while before it is
//! evicted. Process exit discards everything, there is no durable store.

use std::collections::HashMap;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use crate::models::{
    to_view, AggregateMetrics, ProbeStatus, RegisterPayload, RegistryEntry, RegistryEntryView,
    UpdatePayload,
};

#[derive(Debug)]
pub struct Registry {
    entries: HashMap<String, RegistryEntry>,
    stale_timeout: Duration,
    online_window: Duration,
    housekeeping_interval: Duration,
    last_sweep: OffsetDateTime,
}

impl Registry {
    pub fn new(
        stale_timeout: std::time::Duration,
        online_window: std::time::Duration,
        housekeeping_interval: std::time::Duration,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            stale_timeout: Duration::try_from(stale_timeout).unwrap_or(Duration::seconds(300)),
            online_window: Duration::try_from(online_window).unwrap_or(Duration::seconds(60)),
            housekeeping_interval: Duration::try_from(housekeeping_interval)
                .unwrap_or(Duration::seconds(30)),
            last_sweep: OffsetDateTime::now_utc(),
        }
    }

    /// Creates or fully replaces the entry for `payload.pc_id`.
    pub fn register(&mut self, payload: RegisterPayload) {
        let now = OffsetDateTime::now_utc();
        let entry = RegistryEntry {
            pc_id: payload.pc_id.clone(),
            system_info: payload.system_info,
            metrics: payload.metrics.unwrap_or_default(),
            health_results: payload.health_results,
            last_seen: now,
            registered_at: now,
            authenticated: true,
        };
        info!(pc_id = %payload.pc_id, "registered machine");
        self.entries.insert(payload.pc_id, entry);
    }

    /// Merges a report into an existing entry and refreshes `last_seen`.
    /// Returns `false` when the machine has never registered; callers must
    /// register before they may update.
    pub fn update(&mut self, payload: UpdatePayload) -> bool {
        let Some(entry) = self.entries.get_mut(&payload.pc_id) else {
            debug!(pc_id = %payload.pc_id, "update for unregistered machine");
            return false;
        };
        if let Some(system_info) = payload.system_info {
            entry.system_info = system_info;
        }
        if let Some(metrics) = payload.metrics {
            entry.metrics = metrics;
        }
        if let Some(health_results) = payload.health_results {
            entry.health_results = health_results;
        }
        entry.last_seen = OffsetDateTime::now_utc();
        true
    }

    /// Current entry list as API views, after a (throttled) eviction sweep.
    pub fn list_active(&mut self) -> Vec<RegistryEntryView> {
        let now = OffsetDateTime::now_utc();
        self.maybe_sweep(now);
        let mut views: Vec<_> = self
            .entries
            .values()
            .map(|e| to_view(e, now, self.online_window))
            .collect();
        views.sort_by(|a, b| a.pc_id.cmp(&b.pc_id));
        views
    }

    /// Folds the current entry list into dashboard-level aggregates.
    pub fn aggregate(&mut self) -> AggregateMetrics {
        let now = OffsetDateTime::now_utc();
        self.maybe_sweep(now);

        let total_machines = self.entries.len() as u32;
        let online_machines = self
            .entries
            .values()
            .filter(|e| now - e.last_seen <= self.online_window)
            .count() as u32;
        let total_alerts = self.entries.values().map(|e| e.metrics.alerts).sum();

        let mut sum_ms = 0u64;
        let mut samples = 0u64;
        for entry in self.entries.values() {
            for result in &entry.health_results {
                sum_ms += result.response_time_ms;
                samples += 1;
            }
        }
        let average_response_time = if samples > 0 {
            sum_ms as f64 / samples as f64
        } else {
            0.0
        };

        AggregateMetrics {
            total_machines,
            online_machines,
            total_alerts,
            average_response_time,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn maybe_sweep(&mut self, now: OffsetDateTime) {
        if now - self.last_sweep < self.housekeeping_interval {
            return;
        }
        self.last_sweep = now;
        let stale_timeout = self.stale_timeout;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now - entry.last_seen <= stale_timeout);
        let removed = before - self.entries.len();
        if removed > 0 {
            info!(removed, "evicted stale machines");
        }
    }

    /// Counts entries whose latest health results contain failures.
    pub fn machines_with_failures(&self) -> usize {
        self.entries
            .values()
            .filter(|e| {
                e.health_results
                    .iter()
                    .any(|r| r.status == ProbeStatus::Error)
            })
            .count()
    }

    #[cfg(test)]
    fn backdate(&mut self, pc_id: &str, seconds: i64) {
        if let Some(entry) = self.entries.get_mut(pc_id) {
            entry.last_seen -= Duration::seconds(seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HealthCheckResult, MetricsSnapshot, SystemInfo};
    use std::time::Duration as StdDuration;

    fn system_info(pc_id: &str) -> SystemInfo {
        SystemInfo {
            pc_id: pc_id.to_string(),
            hostname: "laptop".to_string(),
            username: "alice".to_string(),
            platform: "linux".to_string(),
            architecture: "x86_64".to_string(),
            cpu_cores: 8,
            total_memory_mb: 16384,
            pid: 4242,
            started_at: "2026-08-24T00:00:00Z".to_string(),
            agent_version: Some("0.1.0".to_string()),
        }
    }

    fn register_payload(pc_id: &str) -> RegisterPayload {
        RegisterPayload {
            pc_id: pc_id.to_string(),
            system_info: system_info(pc_id),
            metrics: Some(MetricsSnapshot {
                alerts: 2,
                ..Default::default()
            }),
            health_results: vec![HealthCheckResult {
                name: "api".to_string(),
                status: ProbeStatus::Healthy,
                response_time_ms: 40,
                error: None,
                timestamp: "2026-08-24T00:00:00Z".to_string(),
            }],
            timestamp: None,
        }
    }

    fn registry() -> Registry {
        // zero housekeeping interval: sweep on every read
        Registry::new(
            StdDuration::from_secs(300),
            StdDuration::from_secs(60),
            StdDuration::ZERO,
        )
    }

    #[test]
    fn update_requires_prior_register() {
        let mut reg = registry();
        let applied = reg.update(UpdatePayload {
            pc_id: "ghost@nowhere".to_string(),
            system_info: None,
            metrics: None,
            health_results: None,
            timestamp: None,
        });
        assert!(!applied);
        assert!(reg.is_empty());
    }

    #[test]
    fn register_then_update_merges_fields() {
        let mut reg = registry();
        reg.register(register_payload("alice@laptop"));

        let applied = reg.update(UpdatePayload {
            pc_id: "alice@laptop".to_string(),
            system_info: None,
            metrics: Some(MetricsSnapshot {
                alerts: 5,
                ..Default::default()
            }),
            health_results: None,
            timestamp: None,
        });
        assert!(applied);

        let views = reg.list_active();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].metrics.alerts, 5);
        // untouched fields keep their registered values
        assert_eq!(views[0].health_results.len(), 1);
        assert_eq!(views[0].system_info.hostname, "laptop");
        assert!(views[0].authenticated);
    }

    #[test]
    fn idempotent_update_changes_only_last_seen() {
        let mut reg = registry();
        reg.register(register_payload("alice@laptop"));

        let payload = || UpdatePayload {
            pc_id: "alice@laptop".to_string(),
            system_info: Some(system_info("alice@laptop")),
            metrics: Some(MetricsSnapshot::default()),
            health_results: Some(vec![]),
            timestamp: None,
        };
        assert!(reg.update(payload()));
        let first = reg.list_active().remove(0);
        assert!(reg.update(payload()));
        let second = reg.list_active().remove(0);

        assert_eq!(first.metrics.alerts, second.metrics.alerts);
        assert_eq!(first.health_results.len(), second.health_results.len());
        assert_eq!(first.registered_at, second.registered_at);
        assert_eq!(first.system_info.pid, second.system_info.pid);
    }

    #[test]
    fn stale_entries_are_evicted_on_read() {
        let mut reg = registry();
        reg.register(register_payload("alice@laptop"));
        reg.register(register_payload("bob@desktop"));
        reg.backdate("bob@desktop", 301);

        let views = reg.list_active();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].pc_id, "alice@laptop");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn offline_but_not_stale_stays_listed() {
        let mut reg = registry();
        reg.register(register_payload("alice@laptop"));
        reg.backdate("alice@laptop", 120);

        let views = reg.list_active();
        assert_eq!(views.len(), 1);
        assert!(!views[0].online);
    }

    #[test]
    fn sweep_is_throttled_by_housekeeping_interval() {
        let mut reg = Registry::new(
            StdDuration::from_secs(300),
            StdDuration::from_secs(60),
            StdDuration::from_secs(3600),
        );
        reg.register(register_payload("alice@laptop"));
        reg.backdate("alice@laptop", 301);

        // sweep ran at construction time, next one is an hour away
        assert_eq!(reg.list_active().len(), 1);
    }

    #[test]
    fn aggregate_folds_entries() {
        let mut reg = registry();
        reg.register(register_payload("alice@laptop"));
        reg.register(register_payload("bob@desktop"));
        reg.backdate("bob@desktop", 120);

        let agg = reg.aggregate();
        assert_eq!(agg.total_machines, 2);
        assert_eq!(agg.online_machines, 1);
        assert_eq!(agg.total_alerts, 4);
        assert!((agg.average_response_time - 40.0).abs() < f64::EPSILON);
    }
}
