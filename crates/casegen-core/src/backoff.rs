//! Exponential backoff for generator retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry policy with capped exponential delays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per generator phase, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Retry immediately; used by tests and offline tooling.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before the retry that follows failed attempt `failed_attempt` (1-based).
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(32);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Sum of every delay one phase can incur.
    pub fn total_backoff(&self) -> Duration {
        (1..self.attempts())
            .map(|n| self.delay_for(n))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Upper bound on wall time for a full run, saturating at `Duration::MAX`.
    ///
    /// Three structured phases (outline, primary, repair) plus up to two
    /// asset calls per file, each phase using every attempt at the full
    /// per-call timeout with all backoff delays.
    pub fn worst_case_latency(&self, file_count: usize, call_timeout: Duration) -> Duration {
        let per_phase = call_timeout
            .checked_mul(self.attempts())
            .and_then(|calls| calls.checked_add(self.total_backoff()));
        let phases = u32::try_from(file_count)
            .ok()
            .and_then(|files| files.checked_mul(2))
            .and_then(|files| files.checked_add(3));
        per_phase
            .zip(phases)
            .and_then(|(per_phase, phases)| per_phase.checked_mul(phases))
            .unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6).map(|n| policy.delay_for(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 8_000, 8_000]);
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(8_000));
    }

    #[test]
    fn worst_case_latency_formula() {
        let policy = RetryPolicy::default();
        // per phase: 3 * 10s + (1s + 2s) = 33s; phases: 3 + 2*4 = 11
        assert_eq!(
            policy.worst_case_latency(4, Duration::from_secs(10)),
            Duration::from_secs(33 * 11)
        );
        assert_eq!(RetryPolicy::immediate(0).attempts(), 1);
    }

    #[test]
    fn worst_case_latency_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.worst_case_latency(10, Duration::from_secs(u64::MAX / 4)),
            Duration::MAX
        );
        assert_eq!(
            policy.worst_case_latency(usize::MAX, Duration::from_secs(1)),
            Duration::MAX
        );

        let slow = RetryPolicy {
            max_attempts: 2_000,
            base_delay_ms: u64::MAX,
            max_delay_ms: u64::MAX,
        };
        assert_eq!(slow.total_backoff(), Duration::MAX);
    }
}
