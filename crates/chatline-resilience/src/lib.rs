// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the Chatline pipeline.
//!
//! [`BackoffPolicy`] computes retry delays for the connection coordinator's
//! reconnect loop and for the offline sync manager's replay sweeps.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff: `min(max, base * 2^attempt)`, optionally jittered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    /// Fraction of the delay used as the jitter band (0.2 = +/-20%).
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            jitter_ratio: 0.2,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration, jitter_ratio: f64) -> Self {
        Self {
            base,
            max,
            jitter_ratio,
        }
    }

    /// Same policy without jitter.
    pub fn without_jitter(self) -> Self {
        Self {
            jitter_ratio: 0.0,
            ..self
        }
    }

    /// Un-jittered delay for `attempt` (0-based). Never exceeds `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis().min(u64::MAX as u128) as u64;
        let max_ms = self.max.as_millis().min(u64::MAX as u128) as u64;
        let factor = 1_u64.checked_shl(attempt.min(63)).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }

    /// Delay for `attempt` shifted by `unit * jitter_ratio`, with `unit` in `[-1, 1]`.
    ///
    /// The result is clamped to `[0, max]`.
    pub fn jittered(&self, attempt: u32, unit: f64) -> Duration {
        let delay = self.delay(attempt);
        if self.jitter_ratio <= 0.0 {
            return delay;
        }
        let unit = if unit.is_finite() {
            unit.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let factor = 1.0 + unit * self.jitter_ratio.min(1.0);
        let ms = (delay.as_millis() as f64 * factor).round().max(0.0) as u64;
        Duration::from_millis(ms).min(self.max)
    }

    /// Delay for `attempt` with random jitter.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        if self.jitter_ratio <= 0.0 {
            return self.delay(attempt);
        }
        let unit = rand::thread_rng().gen_range(-1.0..=1.0);
        self.jittered(attempt, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(1000), Duration::from_millis(30_000), 0.2)
    }

    #[test]
    fn doubles_until_ceiling() {
        let p = policy();
        assert_eq!(p.delay(0), Duration::from_millis(1000));
        assert_eq!(p.delay(1), Duration::from_millis(2000));
        assert_eq!(p.delay(4), Duration::from_millis(16_000));
        assert_eq!(p.delay(5), Duration::from_millis(30_000));
        assert_eq!(p.delay(200), Duration::from_millis(30_000));
    }

    #[test]
    fn jitter_band_is_symmetric_and_clamped() {
        let p = policy();
        assert_eq!(p.jittered(0, -1.0), Duration::from_millis(800));
        assert_eq!(p.jittered(0, 1.0), Duration::from_millis(1200));
        assert_eq!(p.jittered(0, 0.0), Duration::from_millis(1000));
        // At the ceiling, positive jitter cannot exceed max.
        assert_eq!(p.jittered(10, 1.0), Duration::from_millis(30_000));
        assert_eq!(p.jittered(10, -1.0), Duration::from_millis(24_000));
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let p = policy().without_jitter();
        assert_eq!(p.next_delay(2), Duration::from_millis(4000));
    }

    proptest! {
        #[test]
        fn delays_are_non_decreasing_and_bounded(
            base_ms in 1u64..10_000,
            extra_ms in 0u64..120_000,
            n in 1u32..80,
        ) {
            let p = BackoffPolicy::new(
                Duration::from_millis(base_ms),
                Duration::from_millis(base_ms + extra_ms),
                0.0,
            );
            let mut previous = Duration::ZERO;
            for attempt in 0..n {
                let d = p.delay(attempt);
                prop_assert!(d >= previous);
                prop_assert!(d <= p.max);
                previous = d;
            }
        }

        #[test]
        fn random_jitter_stays_in_band(attempt in 0u32..40) {
            let p = policy();
            let d = p.next_delay(attempt);
            let nominal = p.delay(attempt).as_secs_f64();
            prop_assert!(d <= p.max);
            prop_assert!(d.as_secs_f64() >= nominal * 0.8 - 1e-3);
            prop_assert!(d.as_secs_f64() <= nominal * 1.2 + 1e-3);
        }
    }
}
