//! Retry policy: per external-system transient classification and backoff.

use std::collections::BTreeSet;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy declared by one external-system adapter.
///
/// Different upstream systems disagree on what is transient, so this is
/// adapter-local rather than a layer-wide constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Status codes treated as transient for this system.
    pub retryable_statuses: BTreeSet<u16>,

    /// Maximum number of retries after the first attempt. Must be >= 0.
    pub max_retries: i32,

    /// Delay before the first retry.
    pub base_delay_ms: u64,

    /// Ceiling for any computed delay.
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(
        retryable_statuses: impl IntoIterator<Item = u16>,
        max_retries: i32,
        base_delay_ms: u64,
        max_delay_ms: u64,
    ) -> Self {
        Self {
            retryable_statuses: retryable_statuses.into_iter().collect(),
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// A policy that never retries anything.
    pub fn no_retry() -> Self {
        Self::new([], 0, 0, 0)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn is_transient(&self, status: u16) -> bool {
        is_transient(status, self)
    }

    /// Structural check run by the adapter registry.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries < 0 {
            return Err(format!("max_retries must be >= 0 (got {})", self.max_retries));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(format!(
                "base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (1-indexed).
    ///
    /// delay = min(base_delay * 2^(attempt - 1), max_delay)
    ///
    /// base=1s, max=30s:
    /// - attempt 1: 1s
    /// - attempt 2: 2s
    /// - attempt 5: 16s
    /// - attempt 6: 30s (capped)
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let delay_ms = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// `next_delay` plus up to 20% random jitter, still capped at `max_delay`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.next_delay(attempt);
        let spread = delay.as_millis() as u64 / 5;
        if spread == 0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=spread);
        (delay + Duration::from_millis(jitter)).min(self.max_delay())
    }
}

/// Whether `status` is transient under `policy`. Pure set membership.
pub fn is_transient(status: u16, policy: &RetryPolicy) -> bool {
    policy.retryable_statuses.contains(&status)
}
