//! # Environment Configuration
//!
//! Reads deployment settings from the environment and turns them into a
//! [`DbConfig`].
//!
//! ```text
//! STOCKLEDGER_DATABASE_PATH    default: stockledger.db
//! STOCKLEDGER_MAX_CONNECTIONS  default: 5
//! STOCKLEDGER_LOCK_TIMEOUT_MS  default: 5000
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::pool::DbConfig;

pub const ENV_DATABASE_PATH: &str = "STOCKLEDGER_DATABASE_PATH";
pub const ENV_MAX_CONNECTIONS: &str = "STOCKLEDGER_MAX_CONNECTIONS";
pub const ENV_LOCK_TIMEOUT_MS: &str = "STOCKLEDGER_LOCK_TIMEOUT_MS";

const DEFAULT_DATABASE_PATH: &str = "stockledger.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Deployment settings for the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub lock_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl LedgerConfig {
    /// Loads from the process environment, falling back to defaults for
    /// unset variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LedgerConfig::default();

        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_MAX_CONNECTIONS) {
            let max: u32 = parse(ENV_MAX_CONNECTIONS, &raw)?;
            if max == 0 {
                return Err(ConfigError::InvalidValue {
                    var: ENV_MAX_CONNECTIONS,
                    value: raw,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.max_connections = max;
        }

        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            config.lock_timeout = Duration::from_millis(parse(ENV_LOCK_TIMEOUT_MS, &raw)?);
        }

        Ok(config)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .lock_timeout(self.lock_timeout)
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<LedgerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LedgerConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(load(&[]).unwrap(), LedgerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (ENV_DATABASE_PATH, "/data/shop.db"),
            (ENV_MAX_CONNECTIONS, "12"),
            (ENV_LOCK_TIMEOUT_MS, "250"),
        ])
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/shop.db"));
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.lock_timeout, Duration::from_millis(250));

        let db = config.db_config();
        assert_eq!(db.max_connections, 12);
        assert_eq!(db.lock_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[(ENV_MAX_CONNECTIONS, "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: ENV_MAX_CONNECTIONS, .. }));

        assert!(load(&[(ENV_MAX_CONNECTIONS, "0")]).is_err());
        assert!(load(&[(ENV_LOCK_TIMEOUT_MS, "-5")]).is_err());
    }
}
