//! Declared state flowing through the reconciler and the file store

mod common;

use baas_reconciler::controller::{CallContext, DeleteOutcome, ReadOutcome, ReconcileError, Reconciler};
use baas_reconciler::gateway::ResourceGateway;
use baas_reconciler::resource::{ParentKeys, ResourceKind};
use baas_reconciler::state::{bridge, DeclaredResource, FileStateStore, StateDocument, StateStore};
use common::{attrs, record, Reply, ScriptedGateway};
use serde_json::json;
use std::sync::Arc;

fn document() -> StateDocument {
    let mut consortium = DeclaredResource::new("consortium", ResourceKind::Consortium);
    consortium.attributes = attrs(json!({"name": "demo", "description": "demo consortium"}));

    let mut environment = DeclaredResource::new("dev", ResourceKind::Environment);
    environment.parents = vec!["@consortium".to_string()];
    environment.attributes = attrs(json!({"name": "dev", "env_type": "quorum", "consensus_type": "raft"}));

    StateDocument {
        resources: vec![consortium, environment],
    }
}

#[tokio::test(start_paused = true)]
async fn test_references_resolve_after_parent_is_recorded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileStateStore::new(dir.path().join("state.yaml"));
    store.save(&document()).expect("save initial document");

    let gateway = Arc::new(
        ScriptedGateway::new()
            .on("create", vec![Reply::Record(record(ResourceKind::Consortium, "c1", "setup", &[]))]),
    );
    let reconciler = Reconciler::with_defaults(Arc::clone(&gateway) as Arc<dyn ResourceGateway>);
    let ctx = CallContext::background();

    let mut doc = store.load().expect("load");
    // The environment cannot be resolved before its consortium exists
    let err = bridge::desired_spec(&doc.resources[1], &doc).expect_err("unprovisioned parent");
    assert!(matches!(err, ReconcileError::Precondition { .. }));

    let desired = bridge::desired_spec(&doc.resources[0], &doc).expect("consortium spec");
    let created = reconciler.create(&ctx, &desired).await.expect("consortium created");
    bridge::record_ready(&mut doc.resources[0], &created);
    store.save(&doc).expect("save after create");

    let reloaded = store.load().expect("reload");
    assert_eq!(reloaded.resources[0].actual_id(), Some("c1"));
    let env_spec = bridge::desired_spec(&reloaded.resources[1], &reloaded).expect("environment spec");
    assert_eq!(env_spec.parent_keys, ParentKeys::new(["c1"]));
}

#[tokio::test(start_paused = true)]
async fn test_drift_and_removal_clear_actual_state() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .on("get", vec![Reply::Status(404, String::new())])
            .on("delete", vec![Reply::Empty(404)]),
    );
    let reconciler = Reconciler::with_defaults(Arc::clone(&gateway) as Arc<dyn ResourceGateway>);
    let ctx = CallContext::background();

    let mut doc = document();
    bridge::record_ready(&mut doc.resources[0], &record(ResourceKind::Consortium, "c1", "setup", &[]));
    bridge::record_ready(&mut doc.resources[1], &record(ResourceKind::Environment, "e1", "live", &["c1"]));

    let outcome = reconciler
        .read(&ctx, ResourceKind::Environment, "e1", &ParentKeys::new(["c1"]))
        .await
        .expect("read");
    assert_eq!(outcome, ReadOutcome::Drifted);
    assert_eq!(bridge::record_drift(&mut doc.resources[1]), Some("e1".to_string()));
    assert_eq!(doc.resources[1].actual_id(), None);

    let removed = reconciler
        .delete(&ctx, ResourceKind::Consortium, "c1", &ParentKeys::root(), false)
        .await
        .expect("delete");
    assert_eq!(removed, DeleteOutcome::AlreadyAbsent);
    bridge::record_removed(&mut doc.resources[0], removed);
    assert!(doc.resources[0].actual.is_none());
}

#[test]
fn test_changed_attributes_only_compares_reported_keys() {
    let mut doc = document();
    let mut live = record(ResourceKind::Environment, "e1", "live", &["c1"]);
    live.attributes = attrs(json!({"name": "dev", "provider": "besu"}));
    bridge::record_ready(&mut doc.resources[0], &record(ResourceKind::Consortium, "c1", "setup", &[]));
    bridge::record_ready(&mut doc.resources[1], &live);

    let desired = bridge::desired_spec(&doc.resources[1], &doc).expect("spec");
    let actual = doc.resources[1].actual.clone().expect("actual");
    // consensus_type is never echoed back, so only the provider differs
    assert_eq!(bridge::changed_attributes(&desired, &actual), vec!["provider".to_string()]);
}
