//! Storage configuration

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the database file location
pub const DB_PATH_ENV: &str = "SESSION_BRIDGE_DB";

const DB_FILE_NAME: &str = "session_bridge.db";
const APP_DIR_NAME: &str = "session-bridge";

/// Settings for opening the mapping store
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Location of the SQLite database file
    pub db_path: PathBuf,
    /// Maximum number of pooled connections
    pub pool_size: u32,
    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Duration,
    /// How long a caller waits for a free pooled connection
    pub connection_timeout: Duration,
}

impl StorageConfig {
    /// Default settings with the database path resolved from the environment
    pub fn from_env() -> Self {
        let db_path = std::env::var_os(DB_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        Self {
            db_path,
            ..Self::default()
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            pool_size: 10,
            busy_timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-user application data location for the database file
pub fn default_db_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join(APP_DIR_NAME).join(DB_FILE_NAME),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!(".{}", APP_DIR_NAME))
            .join(DB_FILE_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.busy_timeout, Duration::from_secs(10));
        assert!(config.db_path.ends_with("session_bridge.db"));
    }

    #[test]
    fn test_with_db_path_overrides_location() {
        let config = StorageConfig::default().with_db_path("/tmp/custom.db");
        assert_eq!(config.db_path, PathBuf::from("/tmp/custom.db"));
        assert_eq!(config.pool_size, 10);
    }
}
