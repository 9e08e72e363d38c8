//! Bounded exponential backoff for transport-level failures.
//!
//! Pipelines only signal "retryable" versus "fatal" through their error
//! types; the scheduler entry point decides to re-run via this helper, so
//! retry mechanics never leak into the pipeline code.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use tracing::warn;

/// Implemented by errors that distinguish connection-level failures.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt after `attempt` (1-based): base, 2x, 4x, ...
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `operation`, re-running it after a backoff sleep while it fails with a
/// retryable error and attempts remain. Fatal errors and the final failure
/// propagate unchanged.
pub fn run_with_retry<T, E>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: impl FnMut() -> Result<T, E>,
) -> Result<T, E>
where
    E: Retryable + Display,
{
    let mut attempt = 1;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "{label} failed, retrying: {err}"
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
