//! # Declared-State Bridge
//!
//! Pure translation between declared resources and reconciler inputs and
//! outputs. No remote calls, no retries.

use super::{ActualState, DeclaredResource, StateDocument, REFERENCE_PREFIX};
use crate::controller::reconciler::{DeleteOutcome, ReconcileError};
use crate::resource::{DesiredSpec, KindStrategy, ParentKeys, ResourceRecord};
use chrono::Utc;
use tracing::{debug, info};

/// Build the reconciler input for `resource`
///
/// `@name` parents resolve to the remote id of the named resource, which must
/// already be provisioned.
///
/// # Errors
/// [`ReconcileError::Precondition`] for unknown or unprovisioned references
pub fn desired_spec(
    resource: &DeclaredResource,
    document: &StateDocument,
) -> Result<DesiredSpec, ReconcileError> {
    let parents = resource
        .parents
        .iter()
        .map(|parent| resolve_parent(resource, parent, document))
        .collect::<Result<ParentKeys, _>>()?;

    let mut desired = DesiredSpec::new(resource.kind, parents, resource.attributes.clone());
    if resource.shared_deployment {
        desired = desired.shared(resource.identity_key.clone());
    }
    Ok(desired)
}

fn resolve_parent(
    resource: &DeclaredResource,
    parent: &str,
    document: &StateDocument,
) -> Result<String, ReconcileError> {
    let Some(target) = parent.strip_prefix(REFERENCE_PREFIX) else {
        return Ok(parent.to_string());
    };
    let referenced = document
        .find(target)
        .ok_or_else(|| ReconcileError::Precondition {
            kind: resource.kind,
            message: format!("'{}' references unknown resource '{}'", resource.name, target),
        })?;
    referenced
        .actual_id()
        .map(str::to_string)
        .ok_or_else(|| ReconcileError::Precondition {
            kind: resource.kind,
            message: format!(
                "'{}' depends on '{}', which has not been provisioned",
                resource.name, target
            ),
        })
}

/// Store a successfully reconciled record as the resource's actual state
pub fn record_ready(resource: &mut DeclaredResource, record: &ResourceRecord) {
    debug!("Recording {} '{}' as {}", resource.kind, resource.name, record.id);
    resource.actual = Some(ActualState {
        id: record.id.clone(),
        state: record.state.clone(),
        attributes: record.attributes.clone(),
        observed_at: Utc::now(),
    });
}

/// Forget actual state after the remote record disappeared
///
/// Returns the id that was lost, if any.
pub fn record_drift(resource: &mut DeclaredResource) -> Option<String> {
    let lost = resource.actual.take().map(|actual| actual.id);
    if let Some(id) = &lost {
        info!(
            "{} '{}' ({}) no longer exists remotely",
            resource.kind, resource.name, id
        );
    }
    lost
}

/// Forget actual state after a delete
pub fn record_removed(resource: &mut DeclaredResource, outcome: DeleteOutcome) {
    if let Some(actual) = resource.actual.take() {
        info!(
            "{} '{}' ({}) {}",
            resource.kind,
            resource.name,
            actual.id,
            outcome.as_str()
        );
    }
}

/// Desired payload attributes that differ from what was last observed
///
/// Attributes the remote side never reports back are not compared.
#[must_use]
pub fn changed_attributes(desired: &DesiredSpec, actual: &ActualState) -> Vec<String> {
    let payload = desired.kind.strategy().create_payload(desired);
    payload
        .iter()
        .filter(|(key, value)| {
            actual
                .attributes
                .get(key.as_str())
                .is_some_and(|observed| observed != *value)
        })
        .map(|(key, _)| key.clone())
        .collect()
}
