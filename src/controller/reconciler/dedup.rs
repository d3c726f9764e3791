//! # Shared-Resource Deduplication
//!
//! Before creating a resource marked as a shared deployment, or an
//! environment zone, look for an existing live instance with the same
//! identity and adopt it instead.
//!
//! The check and the create are not atomic. Two callers racing on the same
//! identity can both see nothing and both create; this narrows duplicates,
//! it does not prevent them.

use super::reconcile::{call_gateway, rejected};
use super::types::{Operation, ReconcileError};
use crate::controller::context::CallContext;
use crate::gateway::ResourceGateway;
use crate::observability::metrics;
use crate::resource::{IdentityKey, ParentKeys, ResourceKind, ResourceRecord};
use std::sync::Arc;
use tracing::{debug, info};

/// Finds adoptable shared instances through the gateway's list operation
#[derive(Clone)]
pub struct Deduplicator {
    gateway: Arc<dyn ResourceGateway>,
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator").finish_non_exhaustive()
    }
}

impl Deduplicator {
    #[must_use]
    pub fn new(gateway: Arc<dyn ResourceGateway>) -> Self {
        Self { gateway }
    }

    /// Existing record of `kind` under `parents` matching `identity`, if any
    ///
    /// # Errors
    /// Transport, rejection or cancellation of the list call
    pub async fn find_adoptable(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentKeys,
        identity: &IdentityKey,
    ) -> Result<Option<ResourceRecord>, ReconcileError> {
        let response = call_gateway(
            ctx,
            kind,
            Operation::Adopt,
            "",
            parents,
            self.gateway.list(kind, parents),
        )
        .await?;
        if !response.is_success() {
            return Err(rejected(kind, Operation::Adopt, "", parents, response));
        }
        let records = response.body.unwrap_or_default();
        debug!(
            "Found {} {} record(s) under {} while looking for a shared instance",
            records.len(),
            kind,
            parents
        );

        let adopted = select_adoptable(records, identity);
        if let Some(record) = &adopted {
            info!("Adopting existing shared {} {} under {}", kind, record.id, parents);
            metrics::increment_dedup_adoptions();
        }
        Ok(adopted)
    }
}

/// Pick the record to adopt out of a listing
///
/// Candidates must match every identity entry and must not be on their way
/// out. Among several, the lowest id wins so concurrent callers agree.
#[must_use]
pub fn select_adoptable(
    records: Vec<ResourceRecord>,
    identity: &IdentityKey,
) -> Option<ResourceRecord> {
    records
        .into_iter()
        .filter(|record| !record.id.is_empty())
        .filter(|record| !record.is_deleting())
        .filter(|record| record.matches_identity(identity))
        .min_by(|a, b| a.id.cmp(&b.id))
}
