//! Environment-driven configuration for the central service.
//!
//! Every knob has a default so a bare environment still boots. The only
//! fatal case is a listen port that is present but unparseable.

use anyhow::{bail, Result};
use axum::http::HeaderValue;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct CentralConfig {
    pub port: u16,
    pub rate_limit_quota: u32,
    pub rate_limit_window_secs: u64,
    pub stale_timeout_secs: u64,
    pub online_window_secs: u64,
    pub housekeeping_interval_secs: u64,
    pub cors: CorsPolicy,
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            rate_limit_quota: 100,
            rate_limit_window_secs: 60,
            stale_timeout_secs: 300,
            online_window_secs: 60,
            housekeeping_interval_secs: 30,
            cors: CorsPolicy {
                origins: CorsOrigins::Any,
                allow_credentials: false,
            },
        }
    }
}

impl CentralConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = match std::env::var("VIGIL_CENTRAL_PORT") {
            Ok(raw) => match raw.parse::<u16>() {
                Ok(p) => p,
                Err(_) => bail!("VIGIL_CENTRAL_PORT is not a valid port: {raw}"),
            },
            Err(_) => defaults.port,
        };

        Ok(Self {
            port,
            rate_limit_quota: env_parsed("VIGIL_RATE_LIMIT_QUOTA", defaults.rate_limit_quota),
            rate_limit_window_secs: env_parsed(
                "VIGIL_RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            ),
            stale_timeout_secs: env_parsed("VIGIL_STALE_TIMEOUT_SECS", defaults.stale_timeout_secs),
            online_window_secs: env_parsed("VIGIL_ONLINE_WINDOW_SECS", defaults.online_window_secs),
            housekeeping_interval_secs: env_parsed(
                "VIGIL_HOUSEKEEPING_INTERVAL_SECS",
                defaults.housekeeping_interval_secs,
            ),
            cors: CorsPolicy::from_env(),
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

/// Allowed origins plus credentials flag, applied uniformly to all responses.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    pub origins: CorsOrigins,
    pub allow_credentials: bool,
}

#[derive(Debug, Clone)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsPolicy {
    pub fn from_env() -> Self {
        let raw = std::env::var("VIGIL_CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let origins = if raw.trim() == "*" {
            CorsOrigins::Any
        } else {
            CorsOrigins::List(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )
        };
        let allow_credentials = std::env::var("VIGIL_CORS_CREDENTIALS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        Self { origins, allow_credentials }
    }

    /// Resolves the `Access-Control-Allow-Origin` value for a request origin.
    ///
    /// With credentials enabled the wildcard is invalid per the fetch spec,
    /// so the concrete origin is echoed back instead.
    pub fn allow_origin_value(&self, origin: Option<&str>) -> Option<HeaderValue> {
        match &self.origins {
            CorsOrigins::Any => {
                if self.allow_credentials {
                    origin.and_then(|o| HeaderValue::from_str(o).ok())
                } else {
                    Some(HeaderValue::from_static("*"))
                }
            }
            CorsOrigins::List(allowed) => origin
                .filter(|o| allowed.iter().any(|a| a == o))
                .and_then(|o| HeaderValue::from_str(o).ok()),
        }
    }

    /// True when the allow-origin value depends on the request origin.
    pub fn echoes_origin(&self) -> bool {
        self.allow_credentials || matches!(self.origins, CorsOrigins::List(_))
    }
}
