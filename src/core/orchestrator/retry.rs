//! Retry policy and exponential backoff for remote detection

use crate::config::RetryConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Bounds on remote attempts for one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Cap of the exponential delay
    pub max_delay: Duration,

    /// Maximum jitter added to each delay
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(8000),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Builds a policy from job retries and the `[retry]` section
    pub fn from_config(max_retries: u32, config: &RetryConfig) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.base_delay_ms)),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// A policy without delays, for tests and local runs
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Total remote attempts allowed
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Un-jittered delay before retry number `retry` (0-based)
    ///
    /// `base * 2^retry`, capped at `max_delay`.
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Starts a fresh backoff sequence
    pub fn backoff(&self) -> Backoff {
        Backoff::new(*self, StdRng::from_entropy())
    }
}

/// Delay sequence for one chunk
///
/// Successive delays never decrease, even when jitter would otherwise make a
/// later delay shorter than an earlier one.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    rng: StdRng,
    retries: u32,
    last: Duration,
}

impl Backoff {
    fn new(policy: RetryPolicy, rng: StdRng) -> Self {
        Self {
            policy,
            rng,
            retries: 0,
            last: Duration::ZERO,
        }
    }

    /// Backoff with a fixed seed for reproducible jitter
    pub fn with_seed(policy: RetryPolicy, seed: u64) -> Self {
        Self::new(policy, StdRng::seed_from_u64(seed))
    }

    /// Delay before the next retry, or `None` when retries are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.policy.max_retries {
            return None;
        }

        let base = self.policy.base_delay_for(self.retries);
        let jitter_ms = self.policy.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(self.rng.gen_range(0..=jitter_ms))
        };

        let delay = (base + jitter).max(self.last);
        self.last = delay;
        self.retries += 1;
        Some(delay)
    }

    /// Retries handed out so far
    pub fn retries(&self) -> u32 {
        self.retries
    }
}
