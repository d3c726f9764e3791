//! # Reconciler
//!
//! Per-resource state machine against the remote control plane.
//!
//! - `reconcile`: create, read, update and delete with convergence waits
//! - `dedup`: shared-deployment adoption before create
//! - `membership`: membership checks before a destination is written
//! - `types`: outcomes and errors
//! - `validation`: preconditions checked before any remote call

pub mod dedup;
pub mod membership;
pub mod reconcile;
pub mod types;
pub mod validation;

pub use dedup::{select_adoptable, Deduplicator};
pub use membership::{MembershipLink, MembershipVerifier};
pub use reconcile::Reconciler;
pub use types::{DeleteOutcome, Operation, ReadOutcome, ReconcileError};
