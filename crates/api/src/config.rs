//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::Money;
use saga::{DEFAULT_PRICE, SagaConfig};
use thiserror::Error;

/// Units registered at startup when `SEED_UNITS` is unset.
pub const DEFAULT_SEED_UNITS: &str = "FL-0001:100,FL-0002:150";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid SEED_UNITS entry '{0}': expected id:capacity")]
    InvalidSeedUnit(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A unit registered at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedUnit {
    pub id: String,
    pub capacity: u32,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset selects the in-memory store
/// - `PAYMENT_TIMEOUT_MS`: bound on gateway calls (default: `10000`)
/// - `SIDE_EFFECT_TIMEOUT_MS`: bound on loyalty/notification calls (default: `5000`)
/// - `SEED_UNITS`: `id:capacity,...` registered at startup
/// - `PAYMENT_AMOUNT_CENTS`: price charged per booking (default: `15000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub payment_timeout: Duration,
    pub side_effect_timeout: Duration,
    pub seed_units: Vec<SeedUnit>,
    pub payment_amount: Money,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            payment_timeout: millis("PAYMENT_TIMEOUT_MS", defaults.payment_timeout),
            side_effect_timeout: millis("SIDE_EFFECT_TIMEOUT_MS", defaults.side_effect_timeout),
            seed_units: match lookup("SEED_UNITS") {
                Some(raw) => parse_seed_units(&raw)?,
                None => defaults.seed_units,
            },
            payment_amount: lookup("PAYMENT_AMOUNT_CENTS")
                .and_then(|c| c.parse().ok())
                .map(Money::from_cents)
                .unwrap_or(defaults.payment_amount),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig::default()
            .with_payment_timeout(self.payment_timeout)
            .with_side_effect_timeout(self.side_effect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        let saga = SagaConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            payment_timeout: saga.payment_timeout,
            side_effect_timeout: saga.side_effect_timeout,
            seed_units: parse_seed_units(DEFAULT_SEED_UNITS).unwrap_or_default(),
            payment_amount: DEFAULT_PRICE,
        }
    }
}

/// Parses `id:capacity` pairs separated by commas. Blank entries are skipped.
pub fn parse_seed_units(raw: &str) -> Result<Vec<SeedUnit>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, capacity) = entry
                .split_once(':')
                .ok_or_else(|| ConfigError::InvalidSeedUnit(entry.to_string()))?;
            let capacity = capacity
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidSeedUnit(entry.to_string()))?;
            let id = id.trim();
            if id.is_empty() {
                return Err(ConfigError::InvalidSeedUnit(entry.to_string()));
            }
            Ok(SeedUnit {
                id: id.to_string(),
                capacity,
            })
        })
        .collect()
}
