//! Retry policy for remote calls
//!
//! Transient failures wait `delay` and try again until `max_attempts` calls
//! have been made. Permanent failures return at once. With an
//! `attempt_timeout` set, a call that has not finished in time is abandoned
//! and counted as a transient failure.

use std::future::Future;
use std::time::Duration;

use osdu_common::{OsduError, Result};
use tracing::warn;

use crate::client::RemoteError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total calls allowed, including the first
    pub max_attempts: u32,
    /// Fixed wait between attempts
    pub delay: Duration,
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_secs(DEFAULT_DELAY_SECS),
            attempt_timeout: None,
        }
    }
}

/// What a retried call ended with, and how many calls it took
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub result: std::result::Result<T, RemoteError>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            attempt_timeout: None,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(OsduError::config("retry.max_attempts must be at least 1"));
        }
        if self.attempt_timeout.is_some_and(|t| t.is_zero()) {
            return Err(OsduError::config("retry.timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Run `call` under this policy. `call` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Attempted<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, RemoteError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, call(attempt)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(RemoteError::Timeout(limit)),
                },
                None => call(attempt).await,
            };

            let err = match outcome {
                Ok(value) => {
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    }
                },
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= max_attempts {
                return Attempted {
                    result: Err(err),
                    attempts: attempt,
                };
            }

            warn!(
                target_item = label,
                attempt,
                max_attempts,
                error = %err,
                "Attempt failed, retrying in {:?}",
                self.delay
            );
            tokio::time::sleep(self.delay).await;
        }
    }
}
