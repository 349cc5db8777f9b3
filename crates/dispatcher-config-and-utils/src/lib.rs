//! Configuration, error types, and logging setup for the outbox dispatcher.

mod config;
mod error;
mod logging;

pub use config::{
    Config, DEFAULT_BIND_ADDR, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOG_LEVEL, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_RESEND_API_URL, DEFAULT_WORKER_COUNT,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
