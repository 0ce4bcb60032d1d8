//! Service configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the service can start with zero
//! configuration for local development.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use parley_shared::constants::{
    DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_MAX_MESSAGE_CHARS, DEFAULT_MIN_PASSWORD_LEN,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
    DEFAULT_SEARCH_LIMIT, DEFAULT_WATCH_BUFFER,
};

/// Where the document store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Platform data directory (`parley.db`).
    Default,
    /// Explicit database file.
    Path(PathBuf),
    /// Private in-memory database; nothing is persisted.
    InMemory,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Env: `PARLEY_DB_PATH` (`:memory:` selects an in-memory store)
    /// Default: platform data directory.
    pub storage: StorageLocation,

    /// How long SQLite waits on a locked database before reporting BUSY.
    /// Env: `PARLEY_BUSY_TIMEOUT_MS`
    pub busy_timeout_ms: u64,

    /// Total attempts for an operation that hits a transient backend error.
    /// Env: `PARLEY_RETRY_ATTEMPTS` (at least 1)
    pub retry_max_attempts: u32,

    /// Delay before the first retry; doubles on every further attempt.
    /// Env: `PARLEY_RETRY_BASE_DELAY_MS`
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single retry delay.
    /// Env: `PARLEY_RETRY_MAX_DELAY_MS`
    pub retry_max_delay_ms: u64,

    /// Capacity of the change feed. Watches that fall further behind are
    /// re-synchronised from a fresh snapshot.
    /// Env: `PARLEY_WATCH_BUFFER`
    pub watch_buffer: usize,

    /// Env: `PARLEY_MAX_MESSAGE_CHARS`
    pub max_message_chars: usize,

    /// Env: `PARLEY_MIN_PASSWORD_LEN`
    pub min_password_len: usize,

    /// Maximum number of users returned by a text search.
    /// Env: `PARLEY_SEARCH_LIMIT`
    pub search_limit: usize,

    /// Only allow messages between mutual friends.
    /// Env: `PARLEY_REQUIRE_FRIENDSHIP` (true/false)
    /// Default: `false`
    pub require_friendship_to_message: bool,

    /// Argon2id memory cost in KiB.
    /// Env: `PARLEY_PASSWORD_MEMORY_KIB`
    pub password_memory_kib: u32,

    /// Argon2id iteration count.
    /// Env: `PARLEY_PASSWORD_ITERATIONS`
    pub password_iterations: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage: StorageLocation::Default,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            retry_max_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            watch_buffer: DEFAULT_WATCH_BUFFER,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
            search_limit: DEFAULT_SEARCH_LIMIT,
            require_friendship_to_message: false,
            password_memory_kib: argon2::Params::DEFAULT_M_COST,
            password_iterations: argon2::Params::DEFAULT_T_COST,
        }
    }
}

impl ServiceConfig {
    /// Defaults with an in-memory store.
    pub fn in_memory() -> Self {
        Self {
            storage: StorageLocation::InMemory,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServiceConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("PARLEY_DB_PATH") {
            config.storage = match path.trim() {
                "" => StorageLocation::Default,
                ":memory:" => StorageLocation::InMemory,
                p => StorageLocation::Path(PathBuf::from(p)),
            };
        }

        parse_into(&lookup, "PARLEY_BUSY_TIMEOUT_MS", &mut config.busy_timeout_ms);
        parse_into(&lookup, "PARLEY_RETRY_ATTEMPTS", &mut config.retry_max_attempts);
        parse_into(&lookup, "PARLEY_RETRY_BASE_DELAY_MS", &mut config.retry_base_delay_ms);
        parse_into(&lookup, "PARLEY_RETRY_MAX_DELAY_MS", &mut config.retry_max_delay_ms);
        parse_into(&lookup, "PARLEY_WATCH_BUFFER", &mut config.watch_buffer);
        parse_into(&lookup, "PARLEY_MAX_MESSAGE_CHARS", &mut config.max_message_chars);
        parse_into(&lookup, "PARLEY_MIN_PASSWORD_LEN", &mut config.min_password_len);
        parse_into(&lookup, "PARLEY_SEARCH_LIMIT", &mut config.search_limit);
        parse_into(&lookup, "PARLEY_PASSWORD_MEMORY_KIB", &mut config.password_memory_kib);
        parse_into(&lookup, "PARLEY_PASSWORD_ITERATIONS", &mut config.password_iterations);

        if let Some(val) = lookup("PARLEY_REQUIRE_FRIENDSHIP") {
            config.require_friendship_to_message = val == "true" || val == "1";
        }

        if config.retry_max_attempts == 0 {
            tracing::warn!("PARLEY_RETRY_ATTEMPTS must be at least 1, using 1");
            config.retry_max_attempts = 1;
        }
        if config.watch_buffer == 0 {
            tracing::warn!("PARLEY_WATCH_BUFFER must be positive, using default");
            config.watch_buffer = DEFAULT_WATCH_BUFFER;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "Invalid value, using default"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.storage, StorageLocation::Default);
        assert_eq!(config.retry_max_attempts, DEFAULT_RETRY_ATTEMPTS);
        assert!(!config.require_friendship_to_message);
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("PARLEY_DB_PATH", "/tmp/chat.db"),
            ("PARLEY_RETRY_ATTEMPTS", "5"),
            ("PARLEY_SEARCH_LIMIT", "10"),
            ("PARLEY_REQUIRE_FRIENDSHIP", "true"),
        ]));
        assert_eq!(
            config.storage,
            StorageLocation::Path(PathBuf::from("/tmp/chat.db"))
        );
        assert_eq!(config.retry_max_attempts, 5);
        assert_eq!(config.search_limit, 10);
        assert!(config.require_friendship_to_message);
    }

    #[test]
    fn test_memory_path() {
        let config = ServiceConfig::from_lookup(lookup_from(&[("PARLEY_DB_PATH", ":memory:")]));
        assert_eq!(config.storage, StorageLocation::InMemory);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("PARLEY_MAX_MESSAGE_CHARS", "lots"),
            ("PARLEY_RETRY_ATTEMPTS", "0"),
            ("PARLEY_WATCH_BUFFER", "0"),
        ]));
        assert_eq!(config.max_message_chars, DEFAULT_MAX_MESSAGE_CHARS);
        assert_eq!(config.retry_max_attempts, 1);
        assert_eq!(config.watch_buffer, DEFAULT_WATCH_BUFFER);
    }
}
