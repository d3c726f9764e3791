//! # Exponential Backoff
//!
//! Provides the capped exponential delay sequence used between convergence
//! polls.
//!
//! The running delay grows without bound; the cap is applied only when a
//! delay is handed out, so the sequence for 500ms / x2 / 5s is
//! 500ms, 1s, 2s, 4s, 5s, 5s, ...
//!
//! ## Usage
//!
//! ```rust
//! use baas_reconciler::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_millis(500), 2.0, Duration::from_secs(5));
//! assert_eq!(backoff.next_delay(), Duration::from_millis(500));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(1));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(2));
//! ```

use crate::config::PollerConfig;
use std::time::Duration;

/// Exponential backoff calculator
///
/// Each call to [`ExponentialBackoff::next_delay`] returns
/// `min(current, max)` and then multiplies the running delay by `factor`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Initial delay (for reset)
    initial: Duration,
    /// Running delay before the cap is applied
    current: Duration,
    factor: f64,
    max: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(initial: Duration, factor: f64, max: Duration) -> Self {
        Self {
            initial,
            current: initial,
            factor,
            max,
        }
    }

    #[must_use]
    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(config.initial_delay, config.factor, config.max_delay)
    }

    /// Delay to use for the upcoming sleep, capped at `max`
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        self.current.min(self.max)
    }

    /// Get the next delay and advance the sequence
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay();
        self.advance(delay);
        delay
    }

    /// Grow the running delay from the delay that was actually slept
    ///
    /// The poller may sleep less than `current_delay` when the deadline is
    /// close; growth is computed from the slept value, not the nominal one.
    pub fn advance(&mut self, slept: Duration) {
        let factor = if self.factor.is_finite() && self.factor > 0.0 {
            self.factor
        } else {
            1.0
        };
        // Saturate rather than panic if the running delay overflows
        self.current = Duration::try_from_secs_f64(slept.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX);
    }

    /// Reset the backoff to the initial delay
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_config(&PollerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_sequence() {
        let mut backoff = ExponentialBackoff::default();

        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(4000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(5000)); // capped
    }

    #[test]
    fn test_exponential_backoff_stays_at_cap() {
        let mut backoff = ExponentialBackoff::default();
        for _ in 0..5 {
            backoff.next_delay();
        }
        // 5s slept, running delay becomes 10s, still handed out as 5s
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_backoff_reset() {
        let mut backoff = ExponentialBackoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_advance_grows_from_clamped_sleep() {
        let mut backoff = ExponentialBackoff::default();
        // Deadline clamp: only 100ms were actually slept
        backoff.advance(Duration::from_millis(100));
        assert_eq!(backoff.current_delay(), Duration::from_millis(200));
    }

    #[test]
    fn test_non_positive_factor_keeps_delay_flat() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(300), 0.0, Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_millis(300));
        assert_eq!(backoff.next_delay(), Duration::from_millis(300));
    }

    #[test]
    fn test_independent_instances() {
        let mut a = ExponentialBackoff::default();
        let mut b = ExponentialBackoff::default();
        a.next_delay();
        a.next_delay();
        assert_eq!(b.next_delay(), Duration::from_millis(500));
        assert_eq!(a.next_delay(), Duration::from_millis(2000));
    }
}
