//! # Types
//!
//! Outcomes and errors of reconciler operations.

use crate::resource::{ParentKeys, ResourceKind, ResourceRecord};
use thiserror::Error;

/// Reconciler operation, used in errors, spans and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    /// Listing candidates for shared adoption
    Adopt,
    /// Polling for the terminal state
    Wait,
    /// Re-running provisioning after an update
    Reset,
    /// Creating a membership verification proof
    Verify,
    /// Registering a membership identity
    Register,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Adopt => "adopt",
            Operation::Wait => "wait",
            Operation::Reset => "reset",
            Operation::Verify => "verify",
            Operation::Register => "register",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure of a reconciler operation
///
/// Every variant carries enough to identify the resource; remote status and
/// body text are rendered verbatim.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Missing ancestor key, bad identity key, or wrong parent count
    #[error("{kind} precondition failed: {message}")]
    Precondition { kind: ResourceKind, message: String },

    /// The gateway call could not complete
    #[error("{operation} {kind} '{id}' under {parents}: {message}")]
    Transport {
        kind: ResourceKind,
        operation: Operation,
        id: String,
        parents: ParentKeys,
        message: String,
    },

    /// The control plane answered with a non-2xx status
    #[error("{operation} {kind} '{id}' under {parents} failed with status {status}: {body}")]
    Rejected {
        kind: ResourceKind,
        operation: Operation,
        id: String,
        parents: ParentKeys,
        status: u16,
        body: String,
    },

    /// Calls succeeded but the terminal state was not reached in time
    #[error("{kind} '{id}' did not reach state '{expected}' after {attempts} attempt(s): last state '{last_state}'")]
    ConvergenceTimeout {
        kind: ResourceKind,
        id: String,
        expected: String,
        last_state: String,
        attempts: u32,
    },

    #[error("{operation} {kind} '{id}' cancelled")]
    Cancelled {
        kind: ResourceKind,
        operation: Operation,
        id: String,
    },

    #[error("{kind} does not support in-place updates")]
    UpdateNotSupported { kind: ResourceKind },
}

impl ReconcileError {
    /// Short label for metrics
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            ReconcileError::Precondition { .. } => "precondition",
            ReconcileError::Transport { .. } => "transport",
            ReconcileError::Rejected { .. } => "rejected",
            ReconcileError::ConvergenceTimeout { .. } => "timeout",
            ReconcileError::Cancelled { .. } => "cancelled",
            ReconcileError::UpdateNotSupported { .. } => "unsupported",
        }
    }
}

/// Result of reading one record
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Present(ResourceRecord),
    /// The record no longer exists remotely; local state should be cleared
    Drifted,
}

/// Result of deleting one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Already gone before the call
    AlreadyAbsent,
    /// Forgotten locally, left in place remotely
    Detached,
}

impl DeleteOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteOutcome::Deleted => "deleted",
            DeleteOutcome::AlreadyAbsent => "already_absent",
            DeleteOutcome::Detached => "detached",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_renders_status_and_body() {
        let err = ReconcileError::Rejected {
            kind: ResourceKind::Environment,
            operation: Operation::Create,
            id: String::new(),
            parents: ParentKeys::new(["c1"]),
            status: 409,
            body: "{\"errorMessage\":\"duplicate\"}".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("create environment"));
        assert!(message.contains("c1"));
        assert!(message.contains("409"));
        assert!(message.contains("duplicate"));
        assert_eq!(err.outcome(), "rejected");
    }

    #[test]
    fn test_convergence_timeout_renders_last_state() {
        let err = ReconcileError::ConvergenceTimeout {
            kind: ResourceKind::Node,
            id: "n1".to_string(),
            expected: "started".to_string(),
            last_state: "initializing".to_string(),
            attempts: 7,
        };
        let message = err.to_string();
        assert!(message.contains("'started'"));
        assert!(message.contains("'initializing'"));
        assert!(message.contains("7 attempt(s)"));
    }
}
