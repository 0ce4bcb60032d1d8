/// Longest accepted uid, in bytes
pub const MAX_UID_LEN: usize = 128;

/// Default upper bound on message length, in characters
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4096;

/// Default minimum password length, in characters
pub const DEFAULT_MIN_PASSWORD_LEN: usize = 6;

/// Default cap on the number of users returned by a text search
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Default capacity of the change feed backing conversation watches
pub const DEFAULT_WATCH_BUFFER: usize = 64;

/// Default number of attempts for an operation hitting a busy backend
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default delay before the first retry, in milliseconds
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 25;

/// Default cap on a single retry delay, in milliseconds
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 500;

/// Default SQLite busy timeout, in milliseconds
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 250;

/// Argon2id output length in bytes
pub const PASSWORD_HASH_LEN: usize = 32;

/// Argon2id salt length in bytes
pub const PASSWORD_SALT_LEN: usize = 16;
