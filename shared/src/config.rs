//! Configuration management for the quickstart Lambda.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Secret name used when `database_secret_name` is not set.
pub const DEFAULT_SECRET_NAME: &str = "my_oracle_database";

/// Default lifetime of a cached secret, one hour.
pub const DEFAULT_SECRET_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Secret store region; empty means the default AWS region chain
    pub region: String,
    /// Name of the secret holding the database credentials
    pub database_secret_name: String,
    /// How long fetched secrets stay cached; `None` disables the cache
    pub secret_cache_ttl: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Never fails: an unparseable cache TTL falls back to the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_cache_ttl = match lookup("secret_cache_ttl_seconds") {
            None => Some(DEFAULT_SECRET_CACHE_TTL),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(seconds) => Some(Duration::from_secs(seconds)),
                Err(_) => {
                    warn!(
                        value = %raw,
                        default_seconds = DEFAULT_SECRET_CACHE_TTL.as_secs(),
                        "secret_cache_ttl_seconds is not a whole number of seconds, using default"
                    );
                    Some(DEFAULT_SECRET_CACHE_TTL)
                }
            },
        };

        Self {
            region: lookup("region").unwrap_or_default(),
            database_secret_name: lookup("database_secret_name")
                .unwrap_or_else(|| DEFAULT_SECRET_NAME.to_string()),
            secret_cache_ttl,
        }
    }
}
