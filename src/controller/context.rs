//! # Call Context
//!
//! Deadline and cancellation carried through one reconciliation call.
//!
//! A context is cheap to clone; clones share the same [`CancellationToken`],
//! so a caller can keep one handle and cancel a call running on another task.
//! Both the poller sleep and every gateway request are raced against it.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped accepting work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    Cancelled,
    DeadlineExceeded,
}

impl DoneReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DoneReason::Cancelled => "cancelled",
            DoneReason::DeadlineExceeded => "deadline exceeded",
        }
    }
}

/// Deadline plus shared cancellation token for one reconciliation call
#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}

impl CallContext {
    /// Context with no deadline that is only done when cancelled
    #[must_use]
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Context that is done `timeout` from now
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().child_with_timeout(timeout)
    }

    /// Derive a context sharing this one's cancellation, with a deadline no
    /// later than `timeout` from now
    #[must_use]
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, candidate) {
            (Some(existing), Some(candidate)) => Some(existing.min(candidate)),
            (Some(existing), None) => Some(existing),
            (None, candidate) => candidate,
        };
        Self {
            deadline,
            token: self.token.clone(),
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Cancel this context and every clone of it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `Some(reason)` once the context is cancelled or past its deadline
    #[must_use]
    pub fn done(&self) -> Option<DoneReason> {
        if self.is_cancelled() {
            return Some(DoneReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DoneReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the context is cancelled or its deadline passes
    pub async fn wait_done(&self) -> DoneReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    () = self.token.cancelled() => DoneReason::Cancelled,
                    () = tokio::time::sleep_until(deadline) => DoneReason::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                DoneReason::Cancelled
            }
        }
    }

    /// Sleep for `duration`, returning early with the reason if the context
    /// finishes first
    ///
    /// # Errors
    /// Returns the [`DoneReason`] when cancellation or the deadline wins
    pub async fn sleep(&self, duration: Duration) -> Result<(), DoneReason> {
        self.run(tokio::time::sleep(duration)).await
    }

    /// Drive `future` to completion unless the context finishes first
    ///
    /// # Errors
    /// Returns the [`DoneReason`] when cancellation or the deadline wins
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, DoneReason> {
        if let Some(reason) = self.done() {
            return Err(reason);
        }
        tokio::select! {
            biased;
            reason = self.wait_done() => Err(reason),
            output = future => Ok(output),
        }
    }
}
