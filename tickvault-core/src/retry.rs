//! Bounded retry around a single remote request.
//!
//! A request is attempted at most `retries + 1` times. Only transient
//! (`DataError::Network`) failures are retried; anything else propagates on the
//! first attempt. When every attempt fails, the last attempt's error surfaces.

use crate::error::DataError;
use crate::transport::{Request, Transport};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// No sleeping between attempts.
    pub fn immediate(retries: u32) -> Self {
        Self::new(retries, Duration::ZERO)
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Exponential delay before `attempt` (1-based retry index) plus jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_cap = (self.base_delay.as_millis() / 2) as u64;
        let jitter = if jitter_cap > 0 {
            rand::thread_rng().gen_range(0..=jitter_cap)
        } else {
            0
        };
        backoff + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts run out.
    /// `op` receives the 0-based attempt number.
    pub fn run<T, F>(&self, mut op: F) -> Result<T, DataError>
    where
        F: FnMut(u32) -> Result<T, DataError>,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.delay_for(attempt);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }

            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    debug!(attempt, error = %e, "transient failure, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Transport wrapper applying a `RetryPolicy` to every request.
#[derive(Clone)]
pub struct RetryableFetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryableFetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn fetch(&self, request: &Request) -> Result<Vec<u8>, DataError> {
        let result = self.policy.run(|_| self.transport.get(request));
        if let Err(ref e) = result {
            if e.is_transient() {
                warn!(
                    url = %request.url,
                    attempts = self.policy.max_attempts(),
                    error = %e,
                    "request failed after all attempts"
                );
            }
        }
        result
    }
}
