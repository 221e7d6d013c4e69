//! Agent configuration, resolved from the environment.
//!
//! Recognized variables (all optional):
//! - `VIGIL_CENTRAL_URL`            central service base URL (default `http://localhost:8080`)
//! - `VIGIL_CHECK_INTERVAL_SECS`    health-check cycle interval (default 30)
//! - `VIGIL_REPORT_INTERVAL_SECS`   report cycle interval (default 60)
//! - `VIGIL_AGENT_PORT`             local diagnostic HTTP port (default 3001)
//! - `VIGIL_ENDPOINTS`              JSON array of `{name, url, timeoutMs}`
//!
//! A missing value falls back to its default; a malformed value logs a
//! warning and falls back, except for an unparseable port which aborts
//! startup.

use anyhow::{bail, Result};
use serde::Deserialize;
use tracing::warn;

/// One probed endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub central_url: String,
    pub check_interval_secs: u64,
    pub report_interval_secs: u64,
    pub listen_port: u16,
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            central_url: "http://localhost:8080".to_string(),
            check_interval_secs: 30,
            report_interval_secs: 60,
            listen_port: 3001,
            endpoints: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let listen_port = match std::env::var("VIGIL_AGENT_PORT") {
            Ok(raw) => match raw.parse::<u16>() {
                Ok(p) => p,
                Err(_) => bail!("VIGIL_AGENT_PORT is not a valid port: {raw}"),
            },
            Err(_) => defaults.listen_port,
        };

        let central_url = std::env::var("VIGIL_CENTRAL_URL")
            .unwrap_or(defaults.central_url)
            .trim_end_matches('/')
            .to_string();

        let endpoints = match std::env::var("VIGIL_ENDPOINTS") {
            Ok(raw) => parse_endpoints(&raw),
            Err(_) => Vec::new(),
        };

        Ok(Self {
            central_url,
            check_interval_secs: env_parsed("VIGIL_CHECK_INTERVAL_SECS", defaults.check_interval_secs),
            report_interval_secs: env_parsed(
                "VIGIL_REPORT_INTERVAL_SECS",
                defaults.report_interval_secs,
            ),
            listen_port,
            endpoints,
        })
    }
}

fn env_parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{name}={raw} is not valid, using default");
            default
        }),
        Err(_) => default,
    }
}

fn parse_endpoints(raw: &str) -> Vec<EndpointConfig> {
    match serde_json::from_str::<Vec<EndpointConfig>>(raw) {
        Ok(endpoints) => endpoints,
        Err(e) => {
            warn!("VIGIL_ENDPOINTS is not a valid endpoint list ({e}), probing nothing");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_endpoint_list() {
        let raw = r#"[
            {"name": "api", "url": "http://localhost:9000/health", "timeoutMs": 2000},
            {"name": "db", "url": "http://localhost:5432"}
        ]"#;
        let endpoints = parse_endpoints(raw);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].name, "api");
        assert_eq!(endpoints[0].timeout_ms, 2000);
        // default timeout applied when omitted
        assert_eq!(endpoints[1].timeout_ms, 5000);
    }

    #[test]
    fn invalid_endpoint_json_yields_empty_list() {
        assert!(parse_endpoints("{nope").is_empty());
        assert!(parse_endpoints("42").is_empty());
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.listen_port, 3001);
        assert!(cfg.check_interval_secs < cfg.report_interval_secs * 2);
        assert!(cfg.endpoints.is_empty());
    }
}
