//! Ledger configuration loaded from the environment.

use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Bounded wait for per-key serialization before `ContentionError`.
    pub lock_timeout: Duration,
    pub retry: RetryPolicy,
    /// Postgres when set, in-memory otherwise.
    pub database_url: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            retry: RetryPolicy::default(),
            database_url: None,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let millis = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(number(var, lookup(var))?.map(Duration::from_millis).unwrap_or(default))
        };

        let lock_timeout = millis("LEDGER_LOCK_TIMEOUT_MS", defaults.lock_timeout)?;
        if lock_timeout.is_zero() {
            return Err(ConfigError::Zero { var: "LEDGER_LOCK_TIMEOUT_MS" });
        }

        let max_attempts = match number("LEDGER_RETRY_MAX_ATTEMPTS", lookup("LEDGER_RETRY_MAX_ATTEMPTS"))? {
            Some(0) => return Err(ConfigError::Zero { var: "LEDGER_RETRY_MAX_ATTEMPTS" }),
            Some(n) => u32::try_from(n).map_err(|_| ConfigError::InvalidNumber {
                var: "LEDGER_RETRY_MAX_ATTEMPTS",
                value: n.to_string(),
            })?,
            None => defaults.retry.max_attempts,
        };

        let retry = RetryPolicy {
            max_attempts,
            base_delay: millis("LEDGER_RETRY_BASE_DELAY_MS", defaults.retry.base_delay)?,
            max_delay: millis("LEDGER_RETRY_MAX_DELAY_MS", defaults.retry.max_delay)?,
        };

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        Ok(Self {
            lock_timeout,
            retry,
            database_url,
        })
    }
}

fn number(var: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}
