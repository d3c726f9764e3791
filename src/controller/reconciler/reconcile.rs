//! # Reconcile
//!
//! Create, read, update and delete for every resource kind.
//!
//! The control plane provisions asynchronously: a create returns as soon as
//! the record exists, long before it is usable. Kinds with a convergence rule
//! are polled until they report their terminal state, or the call context
//! runs out.
//!
//! Some kinds carry lifecycle quirks, all declared on their
//! [`KindStrategy`]: nodes are reset after an update, destinations check
//! their membership first, environment zones always reuse a matching zone,
//! and a few kinds are only ever forgotten locally on delete.
//!
//! Gateway failures are never retried here. A transport error or an
//! unexpected status during a convergence wait ends the wait at once; only
//! "not there yet" observations are retried.

use super::dedup::Deduplicator;
use super::membership::MembershipVerifier;
use super::types::{DeleteOutcome, Operation, ReadOutcome, ReconcileError};
use super::validation::{validate_id, validate_identity, validate_parents};
use crate::config::{PollerConfig, TimeoutConfig};
use crate::controller::context::{CallContext, DoneReason};
use crate::controller::poller::{Attempt, PollError, Poller};
use crate::gateway::{ApiResponse, GatewayError, ResourceGateway};
use crate::observability::metrics;
use crate::resource::{
    Convergence, DesiredSpec, KindStrategy, ParentKeys, ResourceKind, ResourceRecord,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Generic reconciler driving every kind through its [`KindStrategy`]
#[derive(Clone)]
pub struct Reconciler {
    gateway: Arc<dyn ResourceGateway>,
    poller: Poller,
    timeouts: TimeoutConfig,
    dedup: Deduplicator,
    membership: MembershipVerifier,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("poller", &self.poller)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

/// Why a convergence wait gave up without an error from the remote side
enum WaitFailure {
    Error(ReconcileError),
    /// The context finished while a read was in flight
    Interrupted { reason: DoneReason, attempt: u32 },
}

impl Reconciler {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ResourceGateway>,
        poller: PollerConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            dedup: Deduplicator::new(Arc::clone(&gateway)),
            membership: MembershipVerifier::new(Arc::clone(&gateway)),
            gateway,
            poller: Poller::new(poller),
            timeouts,
        }
    }

    /// Reconciler with default poll pacing and 10 minute operation timeouts
    #[must_use]
    pub fn with_defaults(gateway: Arc<dyn ResourceGateway>) -> Self {
        Self::new(gateway, PollerConfig::default(), TimeoutConfig::default())
    }

    /// Provision `desired` and wait until it is usable
    ///
    /// A shared deployment, or a kind that always reuses existing instances,
    /// first looks for a live record with the same identity and adopts it
    /// instead of creating a new one.
    ///
    /// # Errors
    /// Any [`ReconcileError`]; `ConvergenceTimeout` carries the last state
    /// observed before the deadline
    pub async fn create(
        &self,
        ctx: &CallContext,
        desired: &DesiredSpec,
    ) -> Result<ResourceRecord, ReconcileError> {
        let kind = desired.kind;
        let span = info_span!(
            "reconcile.create",
            resource.kind = %kind,
            resource.parents = %desired.parent_keys,
            resource.shared = desired.shared_deployment
        );
        let ctx = ctx.child_with_timeout(self.timeouts.create);

        async {
            let start = Instant::now();
            let result = self.create_inner(&ctx, kind.strategy(), desired).await;
            record_outcome(kind, Operation::Create, &result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn create_inner(
        &self,
        ctx: &CallContext,
        strategy: &dyn KindStrategy,
        desired: &DesiredSpec,
    ) -> Result<ResourceRecord, ReconcileError> {
        let kind = strategy.kind();
        let parents = &desired.parent_keys;
        validate_parents(strategy, parents)?;

        if desired.shared_deployment || strategy.adopt_existing() {
            let identity =
                strategy
                    .identity_key(desired)
                    .ok_or_else(|| ReconcileError::Precondition {
                        kind,
                        message: "adopting an existing instance needs an identity key and none could be derived"
                            .to_string(),
                    })?;
            validate_identity(kind, &identity)?;

            if let Some(existing) = self
                .dedup
                .find_adoptable(ctx, kind, parents, &identity)
                .await?
            {
                return self.wait_converged(ctx, strategy, parents, existing).await;
            }
        }
        if strategy.verifies_membership() {
            self.membership.prepare(ctx, desired).await?;
        }

        let payload = strategy.create_payload(desired);
        let response = call_gateway(
            ctx,
            kind,
            Operation::Create,
            "",
            parents,
            self.gateway.create(kind, parents, &payload),
        )
        .await?;
        let record = require_record(kind, Operation::Create, "", parents, response)?;
        if record.id.is_empty() {
            return Err(ReconcileError::Transport {
                kind,
                operation: Operation::Create,
                id: String::new(),
                parents: parents.clone(),
                message: "create response carried no id".to_string(),
            });
        }

        info!("Created {} {} (state '{}')", kind, record.id, record.state);
        self.wait_converged(ctx, strategy, parents, record).await
    }

    /// Fetch the current remote record
    ///
    /// A record that no longer exists is reported as [`ReadOutcome::Drifted`]
    /// so the caller can clear its local state.
    ///
    /// # Errors
    /// Any non-2xx status other than not-found, transport failures, and
    /// cancellation
    pub async fn read(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
    ) -> Result<ReadOutcome, ReconcileError> {
        let span = info_span!("reconcile.read", resource.kind = %kind, resource.id = id);

        async {
            let start = Instant::now();
            let result = self.read_inner(ctx, kind, id, parents).await;
            record_outcome(kind, Operation::Read, &result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn read_inner(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
    ) -> Result<ReadOutcome, ReconcileError> {
        validate_parents(kind.strategy(), parents)?;
        validate_id(kind, id)?;

        let response = call_gateway(
            ctx,
            kind,
            Operation::Read,
            id,
            parents,
            self.gateway.get(kind, id, parents),
        )
        .await?;
        if response.is_not_found() {
            warn!("{} {} not found under {}, treating as drifted", kind, id, parents);
            return Ok(ReadOutcome::Drifted);
        }
        let record = require_record(kind, Operation::Read, id, parents, response)?;
        Ok(ReadOutcome::Present(record))
    }

    /// Push `desired` onto the existing record `id`
    ///
    /// Kinds that re-provision on update (nodes) are reset once the update is
    /// accepted, then waited on until they reach the terminal state again.
    ///
    /// # Errors
    /// [`ReconcileError::UpdateNotSupported`] for immutable kinds, without any
    /// remote call; otherwise as for [`Reconciler::create`]
    pub async fn update(
        &self,
        ctx: &CallContext,
        id: &str,
        desired: &DesiredSpec,
    ) -> Result<ResourceRecord, ReconcileError> {
        let kind = desired.kind;
        let span = info_span!("reconcile.update", resource.kind = %kind, resource.id = id);
        let ctx = ctx.child_with_timeout(self.timeouts.update);

        async {
            let start = Instant::now();
            let result = self.update_inner(&ctx, kind.strategy(), id, desired).await;
            record_outcome(kind, Operation::Update, &result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn update_inner(
        &self,
        ctx: &CallContext,
        strategy: &dyn KindStrategy,
        id: &str,
        desired: &DesiredSpec,
    ) -> Result<ResourceRecord, ReconcileError> {
        let kind = strategy.kind();
        if !strategy.is_mutable() {
            return Err(ReconcileError::UpdateNotSupported { kind });
        }
        let parents = &desired.parent_keys;
        validate_parents(strategy, parents)?;
        validate_id(kind, id)?;
        if strategy.verifies_membership() {
            self.membership.prepare(ctx, desired).await?;
        }

        let payload = strategy.update_payload(desired);
        let response = call_gateway(
            ctx,
            kind,
            Operation::Update,
            id,
            parents,
            self.gateway.update(kind, id, parents, &payload),
        )
        .await?;
        let mut record = require_record(kind, Operation::Update, id, parents, response)?;
        if record.id.is_empty() {
            record.id = id.to_string();
        }
        info!("Updated {} {}", kind, record.id);

        if strategy.reset_after_update() {
            let response = call_gateway(
                ctx,
                kind,
                Operation::Reset,
                id,
                parents,
                self.gateway.reset(kind, id, parents),
            )
            .await?;
            if !response.is_success() {
                return Err(rejected(kind, Operation::Reset, id, parents, response));
            }
            info!("Reset {} {} to apply the update", kind, id);
        }
        if strategy.reconverge_on_update() {
            return self.wait_converged(ctx, strategy, parents, record).await;
        }
        Ok(record)
    }

    /// Remove record `id`
    ///
    /// Shared deployments, and kinds the control plane removes together with
    /// their parent, are only forgotten locally; no remote call is made.
    ///
    /// # Errors
    /// Non-2xx statuses other than not-found, transport failures, and
    /// cancellation
    pub async fn delete(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
        shared_deployment: bool,
    ) -> Result<DeleteOutcome, ReconcileError> {
        let span = info_span!(
            "reconcile.delete",
            resource.kind = %kind,
            resource.id = id,
            resource.shared = shared_deployment
        );
        let ctx = ctx.child_with_timeout(self.timeouts.delete);

        async {
            let start = Instant::now();
            let result = self
                .delete_inner(&ctx, kind, id, parents, shared_deployment)
                .await;
            record_outcome(kind, Operation::Delete, &result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn delete_inner(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
        shared_deployment: bool,
    ) -> Result<DeleteOutcome, ReconcileError> {
        if shared_deployment || kind.strategy().detach_on_delete() {
            info!("Detaching {} {}; remote instance left in place", kind, id);
            return Ok(DeleteOutcome::Detached);
        }
        validate_parents(kind.strategy(), parents)?;
        validate_id(kind, id)?;

        let response = call_gateway(
            ctx,
            kind,
            Operation::Delete,
            id,
            parents,
            self.gateway.delete(kind, id, parents),
        )
        .await?;
        if response.is_success() {
            info!("Deleted {} {}", kind, id);
            return Ok(DeleteOutcome::Deleted);
        }
        if response.is_not_found() {
            debug!("{} {} was already gone", kind, id);
            return Ok(DeleteOutcome::AlreadyAbsent);
        }
        Err(rejected(kind, Operation::Delete, id, parents, response))
    }

    /// Poll `record` under `parents` until the kind's convergence rule is met
    async fn wait_converged(
        &self,
        ctx: &CallContext,
        strategy: &dyn KindStrategy,
        parents: &ParentKeys,
        record: ResourceRecord,
    ) -> Result<ResourceRecord, ReconcileError> {
        let kind = strategy.kind();
        let expected = match strategy.convergence() {
            Convergence::None => return Ok(with_parents(record, parents)),
            Convergence::Exists => None,
            Convergence::State(label) => Some(label),
        };

        let id = record.id.clone();
        let label = format!("wait {kind} {id}");
        let last_state = Mutex::new(record.state.clone());
        let gateway = &self.gateway;

        let result = self
            .poller
            .run(ctx, &label, |attempt| {
                let (id, last_state) = (&id, &last_state);
                async move {
                    let response = match ctx.run(gateway.get(kind, id, parents)).await {
                        Ok(Ok(response)) => response,
                        Ok(Err(e)) => {
                            return Attempt::Fatal(WaitFailure::Error(transport(
                                kind,
                                Operation::Wait,
                                id,
                                parents,
                                &e,
                            )))
                        }
                        Err(reason) => {
                            return Attempt::Fatal(WaitFailure::Interrupted { reason, attempt })
                        }
                    };
                    if !response.is_success() {
                        return Attempt::Fatal(WaitFailure::Error(rejected(
                            kind,
                            Operation::Wait,
                            id,
                            parents,
                            response,
                        )));
                    }
                    let Some(current) = response.body else {
                        return Attempt::Fatal(WaitFailure::Error(empty_body(
                            kind,
                            Operation::Wait,
                            id,
                            parents,
                        )));
                    };
                    if let Ok(mut guard) = last_state.lock() {
                        guard.clone_from(&current.state);
                    }
                    match expected {
                        Some(target) if current.state != target => {
                            Attempt::Retry(format!("state '{}', waiting for '{}'", current.state, target))
                        }
                        _ => Attempt::Converged(current),
                    }
                }
            })
            .await;

        let (reason, attempts) = match result {
            Ok(current) => {
                let mut current = with_parents(current, parents);
                if current.id.is_empty() {
                    current.id = id;
                }
                info!("{} {} converged (state '{}')", kind, current.id, current.state);
                return Ok(current);
            }
            Err(PollError::Fatal(WaitFailure::Error(e))) => return Err(e),
            Err(PollError::Fatal(WaitFailure::Interrupted { reason, attempt })) => {
                (reason, attempt)
            }
            Err(PollError::Stopped {
                reason, attempts, ..
            }) => (reason, attempts),
        };

        if reason == DoneReason::Cancelled {
            return Err(ReconcileError::Cancelled {
                kind,
                operation: Operation::Wait,
                id,
            });
        }
        let last_state = last_state
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Err(ReconcileError::ConvergenceTimeout {
            kind,
            id,
            expected: expected.unwrap_or("exists").to_string(),
            last_state,
            attempts,
        })
    }
}

/// Run one gateway call under the context, mapping transport failures and
/// cancellation onto [`ReconcileError`]
///
/// The response status is left for the caller to judge.
pub(crate) async fn call_gateway<T, F>(
    ctx: &CallContext,
    kind: ResourceKind,
    operation: Operation,
    id: &str,
    parents: &ParentKeys,
    call: F,
) -> Result<ApiResponse<T>, ReconcileError>
where
    F: Future<Output = Result<ApiResponse<T>, GatewayError>>,
{
    match ctx.run(call).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(transport(kind, operation, id, parents, &e)),
        Err(DoneReason::Cancelled) => Err(ReconcileError::Cancelled {
            kind,
            operation,
            id: id.to_string(),
        }),
        Err(DoneReason::DeadlineExceeded) => Err(ReconcileError::Transport {
            kind,
            operation,
            id: id.to_string(),
            parents: parents.clone(),
            message: "deadline exceeded before the control plane answered".to_string(),
        }),
    }
}

pub(crate) fn require_record(
    kind: ResourceKind,
    operation: Operation,
    id: &str,
    parents: &ParentKeys,
    response: ApiResponse<ResourceRecord>,
) -> Result<ResourceRecord, ReconcileError> {
    if !response.is_success() {
        return Err(rejected(kind, operation, id, parents, response));
    }
    response
        .body
        .ok_or_else(|| empty_body(kind, operation, id, parents))
}

/// Fill in `parents` when the gateway returned a record without them
fn with_parents(mut record: ResourceRecord, parents: &ParentKeys) -> ResourceRecord {
    if record.parent_keys.is_empty() {
        record.parent_keys = parents.clone();
    }
    record
}

fn transport(
    kind: ResourceKind,
    operation: Operation,
    id: &str,
    parents: &ParentKeys,
    error: &GatewayError,
) -> ReconcileError {
    ReconcileError::Transport {
        kind,
        operation,
        id: id.to_string(),
        parents: parents.clone(),
        message: error.to_string(),
    }
}

pub(crate) fn rejected<T>(
    kind: ResourceKind,
    operation: Operation,
    id: &str,
    parents: &ParentKeys,
    response: ApiResponse<T>,
) -> ReconcileError {
    ReconcileError::Rejected {
        kind,
        operation,
        id: id.to_string(),
        parents: parents.clone(),
        status: response.status,
        body: response.raw,
    }
}

fn empty_body(
    kind: ResourceKind,
    operation: Operation,
    id: &str,
    parents: &ParentKeys,
) -> ReconcileError {
    ReconcileError::Transport {
        kind,
        operation,
        id: id.to_string(),
        parents: parents.clone(),
        message: "successful response carried no record".to_string(),
    }
}

fn record_outcome<T>(
    kind: ResourceKind,
    operation: Operation,
    result: &Result<T, ReconcileError>,
    start: Instant,
) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => {
            warn!("{} {} failed: {}", operation, kind, e);
            e.outcome()
        }
    };
    metrics::record_reconcile_operation(
        kind.as_str(),
        operation.as_str(),
        outcome,
        start.elapsed().as_secs_f64(),
    );
}
