//! # Controller
//!
//! Core reconciliation machinery.
//!
//! - `backoff`: capped exponential delay sequence
//! - `context`: deadline and cancellation for one call
//! - `poller`: convergence polling loop
//! - `reconciler`: per-resource create/read/update/delete

pub mod backoff;
pub mod context;
pub mod poller;
pub mod reconciler;

pub use context::{CallContext, DoneReason};
pub use poller::{Attempt, PollError, Poller};
pub use reconciler::{DeleteOutcome, ReadOutcome, ReconcileError, Reconciler};
