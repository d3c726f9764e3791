//! # Poller Configuration
//!
//! Backoff tuning for convergence waits and the per-operation deadlines the
//! caller applies to each reconciliation call.

use crate::constants::{
    DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_POLL_FACTOR, DEFAULT_POLL_INITIAL_DELAY_MS,
    DEFAULT_POLL_MAX_DELAY_MS,
};
use std::time::Duration;

use super::env_var_or_default;

/// Exponential backoff settings for [`crate::controller::poller::Poller`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollerConfig {
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Cap applied to every individual delay
    pub max_delay: Duration,
    /// Multiplier applied after each sleep
    pub factor: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_POLL_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_POLL_MAX_DELAY_MS),
            factor: DEFAULT_POLL_FACTOR,
        }
    }
}

impl PollerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            initial_delay: Duration::from_millis(env_var_or_default(
                "POLL_INITIAL_DELAY_MS",
                DEFAULT_POLL_INITIAL_DELAY_MS,
            )),
            max_delay: Duration::from_millis(env_var_or_default(
                "POLL_MAX_DELAY_MS",
                DEFAULT_POLL_MAX_DELAY_MS,
            )),
            factor: env_var_or_default("POLL_FACTOR", DEFAULT_POLL_FACTOR),
        }
    }
}

/// Deadlines applied by callers to each kind of reconciliation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS))
    }
}

impl TimeoutConfig {
    /// Same deadline for every operation
    #[must_use]
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            create: timeout,
            update: timeout,
            delete: timeout,
        }
    }
}
