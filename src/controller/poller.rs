//! # Poller
//!
//! Runs a step repeatedly until it converges, fails fatally, or the call
//! context finishes. Delays between attempts follow [`ExponentialBackoff`],
//! clamped so a sleep never runs past the context deadline.
//!
//! Each [`Poller::run`] starts a fresh attempt counter and delay; the poller
//! holds only configuration and can be shared freely.

use crate::config::PollerConfig;
use crate::controller::backoff::ExponentialBackoff;
use crate::controller::context::{CallContext, DoneReason};
use crate::observability::metrics;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

/// Outcome of a single poll step
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Target state reached; stop and return the value
    Converged(T),
    /// Not there yet; the string describes what was observed
    Retry(String),
    /// Stop immediately with this error
    Fatal(E),
}

/// Why a poll run ended without converging
#[derive(Debug, Error)]
pub enum PollError<E> {
    #[error(transparent)]
    Fatal(E),
    #[error("{label}: {} after {attempts} attempt(s){}", .reason.as_str(), last_suffix(.last_observation.as_deref()))]
    Stopped {
        label: String,
        reason: DoneReason,
        attempts: u32,
        last_observation: Option<String>,
    },
}

fn last_suffix(observation: Option<&str>) -> String {
    observation
        .map(|o| format!(" (last observation: {o})"))
        .unwrap_or_default()
}

/// Capped exponential-backoff poller
#[derive(Debug, Clone, Default)]
pub struct Poller {
    config: PollerConfig,
}

impl Poller {
    #[must_use]
    pub fn new(config: PollerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Invoke `step(attempt)` until it converges or fails
    ///
    /// * `Converged` returns at once, without sleeping.
    /// * `Fatal` returns its error at once.
    /// * `Retry` is logged; if the context is already done the run ends with
    ///   [`PollError::Stopped`], otherwise it sleeps and tries again.
    ///
    /// # Errors
    /// [`PollError::Fatal`] for a fatal step, [`PollError::Stopped`] when the
    /// context is cancelled or its deadline passes first
    pub async fn run<T, E, F, Fut>(
        &self,
        ctx: &CallContext,
        label: &str,
        mut step: F,
    ) -> Result<T, PollError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let mut backoff = ExponentialBackoff::from_config(&self.config);
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            metrics::increment_poll_attempts(label);

            let observation = match step(attempt).await {
                Attempt::Converged(value) => {
                    debug!("{} converged on attempt {}", label, attempt);
                    return Ok(value);
                }
                Attempt::Fatal(error) => return Err(PollError::Fatal(error)),
                Attempt::Retry(observation) => observation,
            };
            warn!("{} attempt {}: {}", label, attempt, observation);

            if let Some(reason) = ctx.done() {
                return Err(stopped(label, reason, attempt, observation));
            }

            let mut delay = backoff.current_delay();
            if let Some(remaining) = ctx.remaining() {
                delay = delay.min(remaining);
            }

            if let Err(reason) = ctx.sleep(delay).await {
                // Cancellation interrupts the sleep; a deadline that lands
                // exactly at the end of the clamped sleep gets one last step
                if reason == DoneReason::Cancelled {
                    return Err(stopped(label, reason, attempt, observation));
                }
            }
            backoff.advance(delay);
        }
    }
}

fn stopped<E>(label: &str, reason: DoneReason, attempts: u32, observation: String) -> PollError<E> {
    PollError::Stopped {
        label: label.to_string(),
        reason,
        attempts,
        last_observation: Some(observation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_converged_first_attempt_never_sleeps() {
        let poller = Poller::default();
        let ctx = CallContext::background();
        let start = tokio::time::Instant::now();
        let result: Result<u32, PollError<String>> = poller
            .run(&ctx, "test", |attempt| async move { Attempt::Converged(attempt) })
            .await;
        assert_eq!(result.ok(), Some(1));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_error_mentions_last_observation() {
        let poller = Poller::default();
        let ctx = CallContext::background();
        ctx.cancel();
        let result: Result<(), PollError<String>> = poller
            .run(&ctx, "wait env1", |_| async {
                Attempt::Retry("state=initializing".to_string())
            })
            .await;
        let message = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(message.contains("wait env1"));
        assert!(message.contains("cancelled"));
        assert!(message.contains("state=initializing"));
    }
}
