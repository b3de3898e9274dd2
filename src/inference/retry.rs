use std::fmt::Display;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Exponential backoff with proportional jitter, usable around any fallible remote call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random extra delay, as a fraction of the backoff delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after failed attempt `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = rand::rng().random_range(0.0..=self.jitter);
        delay.mul_f64(1.0 + factor)
    }

    pub fn run<T, E, F>(&self, operation: &str, call: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Result<T, E>,
    {
        self.run_with_sleep(operation, call, std::thread::sleep)
    }

    pub fn run_with_sleep<T, E, F, S>(&self, operation: &str, mut call: F, mut sleep: S) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Result<T, E>,
        S: FnMut(Duration),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1_u32;

        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.jittered(self.backoff(attempt));
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying inference call"
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
