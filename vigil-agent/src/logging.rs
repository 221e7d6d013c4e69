//! Level-filtered logging with selectable output format.
//!
//! Same knobs as the central service: `LOG_LEVEL` (default `info`) and
//! `LOG_FORMAT` (`text`, default, or `json`).

use tracing_subscriber::EnvFilter;

pub fn init() {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
