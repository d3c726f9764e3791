//! # Membership Verification
//!
//! Destinations deliver messages on behalf of a membership. Before one is
//! written, the membership must exist; with `auto_verify_membership` set it
//! also gets a self-signed verification proof (when it has none yet) and its
//! identity is registered with the ID registry service.

use super::reconcile::{call_gateway, rejected, require_record};
use super::types::{Operation, ReconcileError};
use crate::controller::context::CallContext;
use crate::gateway::ResourceGateway;
use crate::resource::{DesiredSpec, ParentKeys, ResourceKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Remote answer when the identity is already registered
const ALREADY_REGISTERED: u16 = 409;

/// Membership wiring read from a destination's desired attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipLink {
    pub consortium_id: String,
    pub membership_id: String,
    pub idregistry_id: Option<String>,
    pub auto_verify: bool,
}

impl MembershipLink {
    /// Read the wiring out of `desired`
    ///
    /// # Errors
    /// [`ReconcileError::Precondition`] when a required id is missing
    pub fn from_desired(desired: &DesiredSpec) -> Result<Self, ReconcileError> {
        let kind = desired.kind;
        let text = |name: &str| {
            desired
                .attributes
                .get(name)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let required = |name: &str| {
            text(name).ok_or_else(|| ReconcileError::Precondition {
                kind,
                message: format!("'{name}' is required"),
            })
        };

        let link = Self {
            consortium_id: required("consortium_id")?,
            membership_id: required("membership_id")?,
            idregistry_id: text("idregistry_id"),
            auto_verify: desired
                .attributes
                .get("auto_verify_membership")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        };
        if link.auto_verify && link.idregistry_id.is_none() {
            return Err(ReconcileError::Precondition {
                kind,
                message: "'idregistry_id' is required when 'auto_verify_membership' is set"
                    .to_string(),
            });
        }
        Ok(link)
    }
}

/// Runs the membership checks destinations need before they are written
#[derive(Clone)]
pub struct MembershipVerifier {
    gateway: Arc<dyn ResourceGateway>,
}

impl std::fmt::Debug for MembershipVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipVerifier").finish_non_exhaustive()
    }
}

impl MembershipVerifier {
    #[must_use]
    pub fn new(gateway: Arc<dyn ResourceGateway>) -> Self {
        Self { gateway }
    }

    /// Check, and optionally verify and register, the membership behind
    /// `desired`
    ///
    /// # Errors
    /// Missing wiring, a membership that cannot be read, or a failed
    /// verification or registration call
    pub async fn prepare(
        &self,
        ctx: &CallContext,
        desired: &DesiredSpec,
    ) -> Result<(), ReconcileError> {
        let link = MembershipLink::from_desired(desired)?;
        let kind = ResourceKind::Membership;
        let id = link.membership_id.as_str();
        let parents = ParentKeys::new([link.consortium_id.as_str()]);

        let response = call_gateway(
            ctx,
            kind,
            Operation::Read,
            id,
            &parents,
            self.gateway.get(kind, id, &parents),
        )
        .await?;
        let membership = require_record(kind, Operation::Read, id, &parents, response)?;
        debug!("Membership {} found under {}", id, parents);

        let Some(idregistry_id) = link.idregistry_id.as_deref().filter(|_| link.auto_verify) else {
            return Ok(());
        };

        let has_proof = membership
            .attributes
            .get("verification_proof")
            .and_then(Value::as_str)
            .is_some_and(|proof| !proof.is_empty());
        if !has_proof {
            let response = call_gateway(
                ctx,
                kind,
                Operation::Verify,
                id,
                &parents,
                self.gateway.verify_membership(&link.consortium_id, id),
            )
            .await?;
            if !response.is_success() {
                return Err(rejected(kind, Operation::Verify, id, &parents, response));
            }
            info!("Created self-signed verification proof for membership {}", id);
        }

        let response = call_gateway(
            ctx,
            kind,
            Operation::Register,
            id,
            &parents,
            self.gateway.register_identity(idregistry_id, id),
        )
        .await?;
        if response.status == ALREADY_REGISTERED {
            debug!("Membership {} already registered with {}", id, idregistry_id);
            return Ok(());
        }
        if !response.is_success() {
            return Err(rejected(kind, Operation::Register, id, &parents, response));
        }
        info!("Registered membership {} with ID registry {}", id, idregistry_id);
        Ok(())
    }
}
