//! Caller-supplied configuration for data sources, pools, and logging.
//!
//! All structs deserialize with serde and fill omitted fields from defaults,
//! so a host can keep them in whatever config file format it already uses.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_POOL_NAME: &str = "memberdb-pool";
pub const DEFAULT_POOL_MAX_SIZE: u32 = 10;
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 30_000;

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.message)
    }
}

impl Error for ConfigError {}

/// Where SQLite connections point and how long they wait on a locked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl DataSourceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::new("path", "database path cannot be empty"));
        }
        if is_in_memory_path(&self.path) {
            return Err(ConfigError::new(
                "path",
                "in-memory databases are private to one connection; use a file path",
            ));
        }
        Ok(())
    }
}

// SQLite opens these as a fresh private database per connection.
fn is_in_memory_path(path: &Path) -> bool {
    let Some(path) = path.to_str() else {
        return false;
    };
    if path == ":memory:" {
        return true;
    }
    match path.strip_prefix("file:") {
        Some(uri) => {
            let (location, query) = uri.split_once('?').unwrap_or((uri, ""));
            location == ":memory:" || query.split('&').any(|param| param == "mode=memory")
        }
        None => false,
    }
}

/// Bounded pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub pool_name: String,
    pub max_size: u32,
    pub connection_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_name: DEFAULT_POOL_NAME.to_string(),
            max_size: DEFAULT_POOL_MAX_SIZE,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
        }
    }
}

impl PoolConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_name.trim().is_empty() {
            return Err(ConfigError::new("pool_name", "pool name cannot be empty"));
        }
        if self.max_size == 0 {
            return Err(ConfigError::new("max_size", "pool needs at least one connection"));
        }
        if self.connection_timeout_ms == 0 {
            return Err(ConfigError::new(
                "connection_timeout_ms",
                "timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Logging backend settings consumed by [`crate::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level_string")]
    pub level: String,
    pub log_dir: PathBuf,
}

impl LogConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: default_log_level_string(),
            log_dir: log_dir.into(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_log_level_string() -> String {
    crate::logging::default_log_level().to_string()
}

#[cfg(test)]
mod tests {
    use super::{DataSourceConfig, LogConfig, PoolConfig, DEFAULT_BUSY_TIMEOUT_MS};
    use std::time::Duration;

    #[test]
    fn pool_config_fills_missing_fields_from_defaults() {
        let config: PoolConfig = serde_json::from_str(r#"{"pool_name":"MyPool"}"#).unwrap();
        assert_eq!(config.pool_name, "MyPool");
        assert_eq!(config.max_size, PoolConfig::default().max_size);
        config.validate().unwrap();
    }

    #[test]
    fn pool_config_rejects_zero_size() {
        let config = PoolConfig {
            max_size: 0,
            ..PoolConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "max_size");
    }

    #[test]
    fn data_source_requires_path() {
        let config: DataSourceConfig =
            serde_json::from_str(r#"{"path":"/tmp/members.db"}"#).unwrap();
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert!(serde_json::from_str::<DataSourceConfig>("{}").is_err());
        assert!(DataSourceConfig::new("").validate().is_err());
    }

    #[test]
    fn data_source_rejects_in_memory_databases() {
        for path in [
            ":memory:",
            "file::memory:",
            "file::memory:?cache=shared",
            "file:members?mode=memory&cache=shared",
        ] {
            let err = DataSourceConfig::new(path).validate().unwrap_err();
            assert_eq!(err.field, "path", "{path}");
        }

        DataSourceConfig::new("members.db").validate().unwrap();
        DataSourceConfig::new("file:members.db?mode=rwc").validate().unwrap();
    }

    #[test]
    fn log_config_defaults_level() {
        let config: LogConfig = serde_json::from_str(r#"{"log_dir":"/var/log/memberdb"}"#).unwrap();
        assert!(!config.level.is_empty());
    }
}
