//! # Sync
//!
//! Whole-document passes over a declared state: apply, refresh and destroy.
//!
//! Resources are handled one at a time and the document is saved after
//! each, including the one that failed, so an interrupted pass leaves the
//! store describing everything reconciled so far.

use super::{bridge, StateError, StateStore};
use crate::controller::reconciler::{ReadOutcome, ReconcileError, Reconciler};
use crate::controller::CallContext;
use crate::resource::{KindStrategy, ResourceKind};
use thiserror::Error;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("failed to {action} '{name}'")]
    Resource {
        name: String,
        action: &'static str,
        #[source]
        source: ReconcileError,
    },
}

/// What a pass did to one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub name: String,
    pub kind: ResourceKind,
    /// Remote id, or `-` when the resource was never provisioned
    pub id: String,
    pub action: String,
}

impl ReportRow {
    fn new(name: &str, kind: ResourceKind, id: &str, action: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            id: id.to_string(),
            action: action.into(),
        }
    }
}

/// Summary of an apply pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Resources whose changed attributes cannot be updated in place, with
    /// the attribute names
    pub needs_replacement: Vec<(String, Vec<String>)>,
}

enum Action {
    Create,
    Update(String),
    Unchanged(String),
}

fn failed(name: &str, action: &'static str) -> impl FnOnce(ReconcileError) -> SyncError {
    let name = name.to_string();
    move |source| SyncError::Resource {
        name,
        action,
        source,
    }
}

/// Create missing resources and update changed mutable ones, in document
/// order
///
/// Changes the remote side cannot apply in place are reported and left
/// alone; replacing a resource is an explicit destroy and apply.
///
/// # Errors
/// The first resource that cannot be resolved, read, created or updated,
/// and any store failure
pub async fn apply(
    reconciler: &Reconciler,
    ctx: &CallContext,
    store: &dyn StateStore,
    mut on_row: impl FnMut(ReportRow),
) -> Result<ApplyReport, SyncError> {
    let mut document = store.load()?;
    let mut report = ApplyReport::default();

    for index in 0..document.resources.len() {
        let resource = &document.resources[index];
        let name = resource.name.clone();
        let kind = resource.kind;
        let strategy = kind.strategy();
        let span = info_span!("sync.apply", resource.name = %name, resource.kind = %kind);

        let desired =
            bridge::desired_spec(resource, &document).map_err(failed(&name, "resolve"))?;

        let action = match resource.actual_id().map(str::to_string) {
            None => Action::Create,
            Some(id) => {
                let read = reconciler
                    .read(ctx, kind, &id, &desired.parent_keys)
                    .instrument(span.clone())
                    .await;
                match read {
                    Err(e) => {
                        store.save(&document)?;
                        return Err(failed(&name, "read")(e));
                    }
                    Ok(ReadOutcome::Drifted) => {
                        bridge::record_drift(&mut document.resources[index]);
                        Action::Create
                    }
                    Ok(ReadOutcome::Present(record)) => {
                        bridge::record_ready(&mut document.resources[index], &record);
                        let changed = document.resources[index]
                            .actual
                            .as_ref()
                            .map(|actual| bridge::changed_attributes(&desired, actual))
                            .unwrap_or_default();

                        let updatable = strategy.update_payload(&desired);
                        let (in_place, fixed): (Vec<_>, Vec<_>) = changed.into_iter().partition(
                            |key| strategy.is_mutable() && updatable.contains_key(key),
                        );
                        if !fixed.is_empty() {
                            info!("'{}' needs replacement for {}", name, fixed.join(", "));
                            report.needs_replacement.push((name.clone(), fixed));
                        }
                        if in_place.is_empty() {
                            Action::Unchanged(id)
                        } else {
                            Action::Update(id)
                        }
                    }
                }
            }
        };

        let outcome = match action {
            Action::Create => reconciler
                .create(ctx, &desired)
                .instrument(span)
                .await
                .map(|record| (record, "created")),
            Action::Update(id) => reconciler
                .update(ctx, &id, &desired)
                .instrument(span)
                .await
                .map(|record| (record, "updated")),
            Action::Unchanged(id) => {
                store.save(&document)?;
                on_row(ReportRow::new(&name, kind, &id, "unchanged"));
                continue;
            }
        };

        match outcome {
            Ok((record, verb)) => {
                bridge::record_ready(&mut document.resources[index], &record);
                store.save(&document)?;
                on_row(ReportRow::new(&name, kind, &record.id, verb));
            }
            Err(e) => {
                store.save(&document)?;
                return Err(failed(&name, "apply")(e));
            }
        }
    }

    Ok(report)
}

/// Record the current remote state of every provisioned resource
///
/// # Errors
/// The first resource that cannot be resolved or read, and any store
/// failure
pub async fn refresh(
    reconciler: &Reconciler,
    ctx: &CallContext,
    store: &dyn StateStore,
    mut on_row: impl FnMut(ReportRow),
) -> Result<(), SyncError> {
    let mut document = store.load()?;

    for index in 0..document.resources.len() {
        let resource = &document.resources[index];
        let name = resource.name.clone();
        let kind = resource.kind;
        let Some(id) = resource.actual_id().map(str::to_string) else {
            on_row(ReportRow::new(&name, kind, "-", "not provisioned"));
            continue;
        };
        let desired =
            bridge::desired_spec(resource, &document).map_err(failed(&name, "resolve"))?;

        let outcome = reconciler
            .read(ctx, kind, &id, &desired.parent_keys)
            .await
            .map_err(failed(&name, "read"))?;
        let action = match outcome {
            ReadOutcome::Present(record) => {
                bridge::record_ready(&mut document.resources[index], &record);
                format!("present ({})", record.state)
            }
            ReadOutcome::Drifted => {
                bridge::record_drift(&mut document.resources[index]);
                "drifted".to_string()
            }
        };
        store.save(&document)?;
        on_row(ReportRow::new(&name, kind, &id, action));
    }

    Ok(())
}

/// Delete or detach every provisioned resource, last declared first, so
/// children go before the parents they reference
///
/// # Errors
/// The first resource that cannot be resolved or deleted, and any store
/// failure
pub async fn destroy(
    reconciler: &Reconciler,
    ctx: &CallContext,
    store: &dyn StateStore,
    mut on_row: impl FnMut(ReportRow),
) -> Result<(), SyncError> {
    let mut document = store.load()?;

    for index in (0..document.resources.len()).rev() {
        let resource = &document.resources[index];
        let name = resource.name.clone();
        let kind = resource.kind;
        let shared = resource.shared_deployment;
        let Some(id) = resource.actual_id().map(str::to_string) else {
            continue;
        };
        let desired =
            bridge::desired_spec(resource, &document).map_err(failed(&name, "resolve"))?;

        let outcome = reconciler
            .delete(ctx, kind, &id, &desired.parent_keys, shared)
            .await
            .map_err(failed(&name, "delete"))?;
        bridge::record_removed(&mut document.resources[index], outcome);
        store.save(&document)?;
        on_row(ReportRow::new(&name, kind, &id, outcome.as_str()));
    }

    Ok(())
}
