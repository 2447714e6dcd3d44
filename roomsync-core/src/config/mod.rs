//! Configuration management
//!
//! Environment-based configuration with defaults and validation. The data
//! source is chosen here exactly once at startup; call sites never
//! re-decide between the real store and the fixture store.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

mod error;

pub use error::ConfigError;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Which durable backend the engine writes through to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum StoreBackend {
    /// SQLite database on disk
    Sqlite { path: PathBuf },
    /// In-process fixture store (development and tests)
    Memory,
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Memory
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable JSON formatting
    pub json_format: bool,
}

impl Config {
    /// Build configuration from `ROOMSYNC_*` environment variables,
    /// falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        match env::var("ROOMSYNC_STORE_BACKEND").as_deref() {
            Ok("memory") => config.store.backend = StoreBackend::Memory,
            Ok("sqlite") => {
                let path = env::var("ROOMSYNC_STORE_PATH")
                    .map_err(|_| ConfigError::Missing("ROOMSYNC_STORE_PATH".to_string()))?;
                config.store.backend = StoreBackend::Sqlite {
                    path: PathBuf::from(path),
                };
            }
            Ok(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "ROOMSYNC_STORE_BACKEND".to_string(),
                    value: other.to_string(),
                })
            }
            Err(_) => {}
        }

        if let Ok(level) = env::var("ROOMSYNC_LOG_LEVEL") {
            config.logging.level = parse_level(&level)?;
        }
        if let Ok(json) = env::var("ROOMSYNC_LOG_JSON") {
            config.logging.json_format = json == "1" || json.eq_ignore_ascii_case("true");
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let StoreBackend::Sqlite { path } = &self.store.backend {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Missing("store.backend.path".to_string()));
            }
        }

        Ok(())
    }
}

fn parse_level(value: &str) -> Result<LogLevel, ConfigError> {
    LogLevel::from_str(value).ok_or_else(|| ConfigError::InvalidValue {
        key: "ROOMSYNC_LOG_LEVEL".to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        assert_eq!(parse_level("debug").unwrap(), LogLevel::Debug);
        assert!(matches!(
            parse_level("verbose"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_sqlite_backend_requires_path() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Sqlite {
            path: PathBuf::new(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }
}
