//! # Observability
//!
//! Logging layer shared by the outbox dispatcher crates.
//!
//! Services call `observability::init()` once at startup and use standard
//! `tracing` macros everywhere else. They have no knowledge of where the
//! log lines end up; in production the hosting platform collects stdout.
//!
//! Two output formats are supported:
//!
//! - [`LogFormat::Compact`]: human-readable single-line output for local runs.
//! - [`LogFormat::Json`]: one JSON object per line (see [`json_layer`]), with
//!   secret-bearing fields redacted.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "outbox-dispatcher".into(),
//!         default_level: "debug".into(),
//!         format: observability::LogFormat::Json,
//!     });
//!
//!     tracing::info!("service started");
//! }
//! ```

pub mod json_layer;

use json_layer::JsonLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Compact,
    /// Structured JSONL.
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to compact for anything unknown.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" | "jsonl" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSON log line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            format: LogFormat::Compact,
        }
    }
}

/// Initialize the observability layer with default settings.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize the observability layer with custom configuration.
///
/// Only the first call installs a subscriber; later calls are ignored.
pub fn init_with_config(config: LogConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(JsonLayer::new(config.service_name.clone(), std::io::stdout))
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!(
            service = %config.service_name,
            format = ?config.format,
            "observability initialized"
        );
    }
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
