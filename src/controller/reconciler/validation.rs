//! # Validation
//!
//! Checks that run before any remote call.

use super::types::ReconcileError;
use crate::resource::{IdentityKey, KindStrategy, ParentKeys, ResourceKind};

/// Every ancestor key the kind needs must be present and non-empty
///
/// # Errors
/// [`ReconcileError::Precondition`] naming the first offending key
pub fn validate_parents(
    strategy: &dyn KindStrategy,
    parents: &ParentKeys,
) -> Result<(), ReconcileError> {
    let kind = strategy.kind();
    let labels = strategy.parent_labels();
    if parents.len() != labels.len() {
        return Err(ReconcileError::Precondition {
            kind,
            message: format!(
                "expected {} parent key(s) [{}], got {}",
                labels.len(),
                labels.join(", "),
                parents.len()
            ),
        });
    }
    for (label, key) in labels.iter().zip(parents.as_slice()) {
        if key.trim().is_empty() {
            return Err(ReconcileError::Precondition {
                kind,
                message: format!("{label} is required but is empty"),
            });
        }
    }
    Ok(())
}

/// Read, update and delete need the remote id
///
/// # Errors
/// [`ReconcileError::Precondition`] when `id` is empty
pub fn validate_id(kind: ResourceKind, id: &str) -> Result<(), ReconcileError> {
    if id.trim().is_empty() {
        return Err(ReconcileError::Precondition {
            kind,
            message: "resource id is required but is empty".to_string(),
        });
    }
    Ok(())
}

/// An identity key must name at least one attribute and no null values
///
/// # Errors
/// [`ReconcileError::Precondition`] for an empty key or a null entry
pub fn validate_identity(kind: ResourceKind, identity: &IdentityKey) -> Result<(), ReconcileError> {
    if identity.is_empty() {
        return Err(ReconcileError::Precondition {
            kind,
            message: "identity key for a shared deployment is empty".to_string(),
        });
    }
    if let Some((name, _)) = identity.iter().find(|(_, value)| value.is_null()) {
        return Err(ReconcileError::Precondition {
            kind,
            message: format!("identity key attribute '{name}' is null"),
        });
    }
    Ok(())
}
