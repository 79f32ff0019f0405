use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;
use mester_db::PoolOptions;

use crate::error::IdentityError;

/// Identity service configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Database file path
    /// Env: DATABASE_PATH (default: "mester.db")
    pub database_path: String,

    /// Number of pooled database connections
    /// Env: DB_POOL_SIZE (default: 4)
    pub pool_size: usize,

    /// Upper bound on a single database call
    /// Env: DB_TIMEOUT_SECS (default: 5)
    pub backend_timeout: Duration,

    /// How often cached names are written to the database
    /// Env: NAME_FLUSH_INTERVAL_SECS (default: 300)
    pub name_flush_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for local runs mostly
        Self {
            database_path: env_or_default_string("DATABASE_PATH", "mester.db"),
            pool_size: env_or_default("DB_POOL_SIZE", 4),
            backend_timeout: Duration::from_secs(env_or_default("DB_TIMEOUT_SECS", 5)),
            name_flush_interval: Duration::from_secs(env_or_default("NAME_FLUSH_INTERVAL_SECS", 300)),
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.pool_size == 0 {
            return Err(IdentityError::Config("DB_POOL_SIZE must be at least 1".into()));
        }
        if self.backend_timeout.is_zero() {
            return Err(IdentityError::Config("DB_TIMEOUT_SECS must be at least 1".into()));
        }
        if self.name_flush_interval.is_zero() {
            return Err(IdentityError::Config(
                "NAME_FLUSH_INTERVAL_SECS must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            pool_size: self.pool_size,
            timeout: self.backend_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "mester.db".to_string(),
            pool_size: 4,
            backend_timeout: Duration::from_secs(5),
            name_flush_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
