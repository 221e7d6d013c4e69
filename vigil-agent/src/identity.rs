//! Machine identity discovery.
//!
//! The identity anchors the API key binding on the central side, so it is
//! computed exactly once at startup and never recomputed mid-process.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::info;

/// Stable identity plus static facts for this machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineIdentity {
    pub pc_id: String,
    pub hostname: String,
    pub username: String,
    pub platform: String,
    pub architecture: String,
    pub cpu_cores: u32,
    pub total_memory_mb: u64,
    pub pid: u32,
    pub started_at: String,
    pub agent_version: Option<String>,
}

impl MachineIdentity {
    /// Collects the identity for the current process. Deterministic for the
    /// process lifetime; call once and share the result.
    pub fn discover() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown-host".to_string());
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        let pc_id = format!("{username}@{hostname}");

        let sys = System::new_all();
        let cpu_cores = sys.cpus().len() as u32;
        let total_memory_mb = sys.total_memory() / (1024 * 1024);

        info!(%pc_id, platform = std::env::consts::OS, "machine identity resolved");

        Self {
            pc_id,
            hostname,
            username,
            platform: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores,
            total_memory_mb,
            pid: std::process::id(),
            started_at: Utc::now().to_rfc3339(),
            agent_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}
