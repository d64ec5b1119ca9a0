//! Application configuration loaded from environment variables.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: Postgres event store; in-memory when unset
/// - `PAYMENT_KEY_ID`, `PAYMENT_KEY_SECRET`, `PAYMENT_CURRENCY` (default `INR`)
/// - `CALL_TIMEOUT_MS`: bound on each downstream call (default 2000)
/// - `COMPENSATION_MAX_ATTEMPTS`, `COMPENSATION_BACKOFF_MS`: background
///   release retries (default 5 attempts from 100ms)
/// - `RECONCILE_INTERVAL_SECS`: recovery sweep period, `0` disables (default 30)
/// - `AUTHZ_ENABLED`: route authorization (default `true`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub payment_key_id: String,
    pub payment_key_secret: String,
    pub payment_currency: String,
    pub call_timeout: Duration,
    pub compensation_max_attempts: u32,
    pub compensation_backoff: Duration,
    pub reconcile_interval: Option<Duration>,
    pub authz_enabled: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any name → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let log_format = match get("LOG_FORMAT") {
            None => defaults.log_format,
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" | "pretty" => LogFormat::Text,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "LOG_FORMAT",
                        value: v,
                    });
                }
            },
        };

        let reconcile_secs: u64 = parse(&get, "RECONCILE_INTERVAL_SECS", 30)?;

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(&get, "PORT", defaults.port)?,
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: get("DATABASE_URL"),
            payment_key_id: get("PAYMENT_KEY_ID").unwrap_or(defaults.payment_key_id),
            payment_key_secret: get("PAYMENT_KEY_SECRET").unwrap_or(defaults.payment_key_secret),
            payment_currency: get("PAYMENT_CURRENCY").unwrap_or(defaults.payment_currency),
            call_timeout: Duration::from_millis(parse(&get, "CALL_TIMEOUT_MS", 2000)?),
            compensation_max_attempts: parse(
                &get,
                "COMPENSATION_MAX_ATTEMPTS",
                defaults.compensation_max_attempts,
            )?,
            compensation_backoff: Duration::from_millis(parse(&get, "COMPENSATION_BACKOFF_MS", 100)?),
            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            authz_enabled: parse(&get, "AUTHZ_ENABLED", defaults.authz_enabled)?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            payment_key_id: "test_key".to_string(),
            payment_key_secret: "test_secret".to_string(),
            payment_currency: "INR".to_string(),
            call_timeout: Duration::from_millis(2000),
            compensation_max_attempts: 5,
            compensation_backoff: Duration::from_millis(100),
            reconcile_interval: Some(Duration::from_secs(30)),
            authz_enabled: true,
        }
    }
}
