//! Logging initialization for the dispatcher.
//!
//! Thin wrapper over the observability crate. The output format comes from
//! `OUTBOX_LOG_FORMAT` (`json` or `compact`); the level from the caller,
//! overridable with `RUST_LOG`.

use observability::{LogConfig, LogFormat};

const SERVICE_NAME: &str = "outbox-dispatcher";

/// Initialize the logging system for the dispatcher.
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("dispatcher started");
/// ```
pub fn init_logging(level: &str) {
    let format = std::env::var("OUTBOX_LOG_FORMAT")
        .ok()
        .and_then(non_empty_env)
        .map(|raw| LogFormat::from_name(&raw))
        .unwrap_or_default();

    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: parse_level(level).to_string().to_ascii_lowercase(),
        format,
    });
}

fn non_empty_env(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
