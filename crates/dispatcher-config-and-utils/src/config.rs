//! Configuration management for the dispatcher.
//!
//! Built once at process start and handed to the store, sender and
//! dispatcher. Tunables may come from an optional JSON file; secrets only
//! ever come from the environment.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default email provider base URL.
pub const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com";

/// Default per-call HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Default attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default worker pool size.
pub const DEFAULT_WORKER_COUNT: usize = 3;

/// Default listen address for the trigger server.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8787";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
const ENV_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
const ENV_RESEND_API_KEY: &str = "RESEND_API_KEY";
const ENV_RESEND_API_URL: &str = "RESEND_API_URL";
const ENV_CRON_SECRET: &str = "OUTBOX_CRON_SECRET";
const ENV_EMAIL_FROM: &str = "EMAIL_FROM";
const ENV_HTTP_TIMEOUT_SECS: &str = "OUTBOX_HTTP_TIMEOUT_SECS";
const ENV_MAX_ATTEMPTS: &str = "OUTBOX_MAX_ATTEMPTS";
const ENV_WORKER_COUNT: &str = "OUTBOX_WORKER_COUNT";
const ENV_BIND_ADDR: &str = "OUTBOX_BIND_ADDR";
const ENV_LOG_LEVEL: &str = "OUTBOX_LOG_LEVEL";

/// Main dispatcher configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Listen address of the trigger server.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Supabase project URL.
    #[serde(default)]
    pub supabase_url: String,
    /// Email provider base URL.
    #[serde(default = "default_resend_api_url")]
    pub resend_api_url: String,
    /// Sender address for outgoing mail.
    #[serde(default)]
    pub email_from: String,
    /// Timeout applied to every outbound HTTP call.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Attempts after which an item is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Upper bound on concurrent workers per invocation.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Supabase service-role key (environment only).
    #[serde(skip)]
    pub supabase_service_role_key: String,
    /// Email provider API key (environment only).
    #[serde(skip)]
    pub resend_api_key: String,
    /// Shared secret expected on trigger requests (environment only).
    #[serde(skip)]
    pub cron_secret: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_resend_api_url() -> String {
    DEFAULT_RESEND_API_URL.to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            bind_addr: default_bind_addr(),
            supabase_url: String::new(),
            resend_api_url: default_resend_api_url(),
            email_from: String::new(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            worker_count: DEFAULT_WORKER_COUNT,
            supabase_service_role_key: String::new(),
            resend_api_key: String::new(),
            cron_secret: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus the process environment.
    ///
    /// Fails if any required setting is missing after both sources are merged.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load tunables from a JSON file. Secrets in the file are ignored.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from variables, skipping blank values.
    fn apply_overrides<F>(&mut self, lookup: F) -> CoreResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).and_then(non_empty);

        if let Some(v) = get(ENV_SUPABASE_URL) {
            self.supabase_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get(ENV_SERVICE_ROLE_KEY) {
            self.supabase_service_role_key = v;
        }
        if let Some(v) = get(ENV_RESEND_API_KEY) {
            self.resend_api_key = v;
        }
        if let Some(v) = get(ENV_RESEND_API_URL) {
            self.resend_api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get(ENV_CRON_SECRET) {
            self.cron_secret = v;
        }
        if let Some(v) = get(ENV_EMAIL_FROM) {
            self.email_from = v;
        }
        if let Some(v) = get(ENV_BIND_ADDR) {
            self.bind_addr = v;
        }
        if let Some(v) = get(ENV_LOG_LEVEL) {
            self.log_level = v;
        }
        if let Some(v) = get(ENV_HTTP_TIMEOUT_SECS) {
            self.http_timeout_secs = parse_number(ENV_HTTP_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(ENV_MAX_ATTEMPTS) {
            self.max_attempts = parse_number(ENV_MAX_ATTEMPTS, &v)?;
        }
        if let Some(v) = get(ENV_WORKER_COUNT) {
            self.worker_count = parse_number(ENV_WORKER_COUNT, &v)?;
        }
        Ok(())
    }

    /// Check that every required setting is present and well-formed.
    pub fn validate(&self) -> CoreResult<()> {
        let required = [
            (ENV_SUPABASE_URL, &self.supabase_url),
            (ENV_SERVICE_ROLE_KEY, &self.supabase_service_role_key),
            (ENV_RESEND_API_KEY, &self.resend_api_key),
            (ENV_CRON_SECRET, &self.cron_secret),
            (ENV_EMAIL_FROM, &self.email_from),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::MissingConfig(missing));
        }

        self.supabase_url()?;
        Url::parse(&self.resend_api_url)?;

        if self.http_timeout_secs == 0 {
            return Err(CoreError::Config(format!(
                "{ENV_HTTP_TIMEOUT_SECS} must be at least 1"
            )));
        }
        // A row must pass through `retry` before it can fail.
        if self.max_attempts < 2 {
            return Err(CoreError::Config(format!(
                "{ENV_MAX_ATTEMPTS} must be at least 2"
            )));
        }
        if self.worker_count == 0 {
            return Err(CoreError::Config(format!(
                "{ENV_WORKER_COUNT} must be at least 1"
            )));
        }
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    /// Log level to start with: the command-line value if given, else ours.
    pub fn resolved_log_level<'a>(&'a self, cli_level: Option<&'a str>) -> &'a str {
        cli_level
            .map(str::trim)
            .filter(|level| !level.is_empty())
            .unwrap_or(&self.log_level)
    }

        /// Timeout applied to outbound HTTP calls.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("log_level", &self.log_level)
            .field("bind_addr", &self.bind_addr)
            .field("supabase_url", &self.supabase_url)
            .field("resend_api_url", &self.resend_api_url)
            .field("email_from", &self.email_from)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("worker_count", &self.worker_count)
            .finish_non_exhaustive()
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> CoreResult<T> {
    raw.parse::<T>()
        .map_err(|_| CoreError::Config(format!("{name} must be a number, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn full_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (ENV_SUPABASE_URL, "https://abc.supabase.co/".to_string()),
            (ENV_SERVICE_ROLE_KEY, "service-role".to_string()),
            (ENV_RESEND_API_KEY, "re_test".to_string()),
            (ENV_CRON_SECRET, "cron-secret".to_string()),
            (ENV_EMAIL_FROM, "Mudanzas <no-reply@example.com>".to_string()),
        ])
    }

    fn lookup<'a>(env: &'a HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> + 'a {
        move |name: &str| env.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_with_required_values() {
        let env = full_env();
        let config = Config::from_lookup(lookup(&env)).unwrap();

        assert_eq!(config.supabase_url, "https://abc.supabase.co");
        assert_eq!(config.supabase_service_role_key, "service-role");
        assert_eq!(config.resend_api_key, "re_test");
        assert_eq!(config.cron_secret, "cron-secret");
        assert_eq!(config.resend_api_url, DEFAULT_RESEND_API_URL);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.worker_count, DEFAULT_WORKER_COUNT);
        assert_eq!(config.http_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_missing_values_are_all_reported() {
        let mut env = full_env();
        env.remove(ENV_RESEND_API_KEY);
        env.insert(ENV_CRON_SECRET, "   ".to_string());

        let err = Config::from_lookup(lookup(&env)).unwrap_err();
        match err {
            CoreError::MissingConfig(names) => {
                assert_eq!(names, vec![ENV_RESEND_API_KEY, ENV_CRON_SECRET]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_environment_fails_fast() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("SUPABASE_URL"));
        assert!(err.to_string().contains("EMAIL_FROM"));
    }

    #[test]
    fn test_numeric_overrides() {
        let mut env = full_env();
        env.insert(ENV_MAX_ATTEMPTS, "7".to_string());
        env.insert(ENV_WORKER_COUNT, "2".to_string());
        env.insert(ENV_HTTP_TIMEOUT_SECS, "4".to_string());

        let config = Config::from_lookup(lookup(&env)).unwrap();
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.http_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn test_non_numeric_override_is_rejected() {
        let mut env = full_env();
        env.insert(ENV_MAX_ATTEMPTS, "five".to_string());

        let err = Config::from_lookup(lookup(&env)).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let mut env = full_env();
        env.insert(ENV_WORKER_COUNT, "0".to_string());

        assert!(Config::from_lookup(lookup(&env)).is_err());
    }

    #[test]
    fn test_attempt_ceiling_below_two_is_rejected() {
        for raw in ["0", "1"] {
            let mut env = full_env();
            env.insert(ENV_MAX_ATTEMPTS, raw.to_string());

            let err = Config::from_lookup(lookup(&env)).unwrap_err();
            assert!(err.to_string().contains(ENV_MAX_ATTEMPTS));
        }

        let mut env = full_env();
        env.insert(ENV_MAX_ATTEMPTS, "2".to_string());
        assert_eq!(Config::from_lookup(lookup(&env)).unwrap().max_attempts, 2);
    }

    #[test]
    fn test_resolved_log_level() {
        let mut env = full_env();
        env.insert(ENV_LOG_LEVEL, "warn".to_string());
        let config = Config::from_lookup(lookup(&env)).unwrap();

        assert_eq!(config.resolved_log_level(None), "warn");
        assert_eq!(config.resolved_log_level(Some(" ")), "warn");
        assert_eq!(config.resolved_log_level(Some("debug")), "debug");
    }

    #[test]
    fn test_invalid_supabase_url() {
        let mut env = full_env();
        env.insert(ENV_SUPABASE_URL, "not a valid url".to_string());

        let err = Config::from_lookup(lookup(&env)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidUrl(_)));
    }

    #[test]
    fn test_load_from_file_ignores_secrets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dispatcher.json");
        std::fs::write(
            &path,
            r#"{
                "log_level": "debug",
                "worker_count": 2,
                "cron_secret": "from-file"
            }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(config.cron_secret.is_empty());
    }

    #[test]
    fn test_debug_output_hides_secrets() {
        let env = full_env();
        let config = Config::from_lookup(lookup(&env)).unwrap();

        let rendered = format!("{config:?}");
        assert!(rendered.contains("abc.supabase.co"));
        assert!(!rendered.contains("service-role"));
        assert!(!rendered.contains("re_test"));
        assert!(!rendered.contains("cron-secret"));
    }
}
