//! Bounded retry with exponential backoff for transient backend failures.

use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.retry_max_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        )
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget
    /// is spent. A spent budget surfaces as [`ServiceError::Unavailable`].
    pub fn run<T, F>(&self, name: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Err(err) if err.is_transient() => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(op = name, attempts = attempt, error = %err, "giving up");
                        return Err(match err {
                            ServiceError::Storage(source) => ServiceError::Unavailable {
                                attempts: attempt,
                                source,
                            },
                            other => other,
                        });
                    }
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        op = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient backend failure, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
