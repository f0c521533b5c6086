//! Exponential backoff driver.
//!
//! The operation being retried reports what should happen next as data
//! ([`Attempt`]) so the driver itself knows nothing about HTTP.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SorloadError};

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    /// Worth trying again after a delay.
    Retry(SorloadError),
    /// Stop immediately.
    Permanent(SorloadError),
}

/// Exponential backoff with jitter, bounded by both elapsed time and attempt count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    /// Each delay is drawn from `delay * (1 ± randomization_factor)`.
    pub randomization_factor: f64,
    pub max_interval_ms: u64,
    /// No new attempt is started once this much time has passed.
    pub max_elapsed_ms: u64,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval_ms: 60_000,
            max_elapsed_ms: 15 * 60 * 1000,
            max_attempts: 10,
        }
    }
}

impl BackoffPolicy {
    /// Reject values that would make delays meaningless or the jitter
    /// range unsampleable.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SorloadError::Config(
                "fetch.backoff.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(SorloadError::Config(format!(
                "fetch.backoff.multiplier must be a finite number >= 1, got {}",
                self.multiplier
            )));
        }
        if !self.randomization_factor.is_finite()
            || !(0.0..=1.0).contains(&self.randomization_factor)
        {
            return Err(SorloadError::Config(format!(
                "fetch.backoff.randomization_factor must be between 0 and 1, got {}",
                self.randomization_factor
            )));
        }
        Ok(())
    }

    /// Un-jittered delay before retry number `retry` (0-based).
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let ms = (self.initial_interval_ms as f64 * factor).min(self.max_interval_ms as f64);
        Duration::from_millis(ms as u64)
    }

    fn jittered_delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry).as_millis() as f64;
        if !(self.randomization_factor > 0.0 && self.randomization_factor.is_finite()) || base == 0.0 {
            return Duration::from_millis(base as u64);
        }
        let delta = base * self.randomization_factor;
        let ms = rand::thread_rng().gen_range((base - delta)..=(base + delta));
        Duration::from_millis(ms.max(0.0) as u64)
    }
}

/// Run `op` until it succeeds, reports a permanent failure, or the policy
/// gives up. `op` receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(policy: &BackoffPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let started = Instant::now();
    let max_elapsed = Duration::from_millis(policy.max_elapsed_ms);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match op(attempt).await {
            Attempt::Success(value) => return Ok(value),
            Attempt::Permanent(err) => return Err(err),
            Attempt::Retry(err) => err,
        };

        let delay = policy.jittered_delay(attempt - 1);
        if attempt >= policy.max_attempts || started.elapsed() + delay > max_elapsed {
            return Err(SorloadError::RetriesExhausted {
                attempts: attempt,
                source: Box::new(err),
            });
        }

        warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Attempt failed, retrying");
        tokio::time::sleep(delay).await;
    }
}
