//! Pact contract tests for the control plane REST API
//!
//! These tests define the contract between the reconciler and the control
//! plane. Each one drives [`RestGateway`] against a Pact mock server.

mod common;

use baas_reconciler::config::GatewayConfig;
use baas_reconciler::gateway::{ResourceGateway, RestGateway};
use baas_reconciler::resource::{ParentKeys, ResourceKind};
use common::{attrs, init_rustls};
use pact_consumer::prelude::*;
use serde_json::json;

const CONSUMER: &str = "BaaS-Reconciler";
const PROVIDER: &str = "Control-Plane";

fn gateway_for(url: &str) -> RestGateway {
    RestGateway::new(&GatewayConfig::new(url, "test-key")).expect("Failed to build gateway")
}

#[tokio::test]
async fn test_create_environment_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("create an environment in a consortium", "", |mut i| {
        i.given("consortium c1 exists");
        i.request
            .method("POST")
            .path("/consortia/c1/environments")
            .header("authorization", "Bearer test-key")
            .header("content-type", "application/json")
            .json_body(json!({
                "name": "dev",
                "provider": "quorum",
                "consensus_type": "raft"
            }));
        i.response
            .status(201)
            .header("content-type", "application/json")
            .json_body(json!({
                "_id": "e1",
                "name": "dev",
                "provider": "quorum",
                "consensus_type": "raft",
                "state": "initializing"
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let gateway = gateway_for(mock_server.url().as_str());

    let response = gateway
        .create(
            ResourceKind::Environment,
            &ParentKeys::new(["c1"]),
            &attrs(json!({"name": "dev", "provider": "quorum", "consensus_type": "raft"})),
        )
        .await
        .expect("Failed to create environment");

    assert_eq!(response.status, 201);
    let record = response.body.expect("record decoded");
    assert_eq!(record.id, "e1");
    assert_eq!(record.state, "initializing");
    assert_eq!(record.attributes.get("provider"), Some(&json!("quorum")));
}

#[tokio::test]
async fn test_get_node_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("get a started node", "", |mut i| {
        i.given("node n1 exists and is started");
        i.request
            .method("GET")
            .path("/consortia/c1/environments/e1/nodes/n1")
            .header("authorization", "Bearer test-key");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "_id": "n1",
                "name": "node1",
                "role": "validator",
                "state": "started",
                "urls": {"rpc": "https://e1-n1.example.com"}
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let gateway = gateway_for(mock_server.url().as_str());

    let response = gateway
        .get(ResourceKind::Node, "n1", &ParentKeys::new(["c1", "e1"]))
        .await
        .expect("Failed to get node");

    assert!(response.is_success());
    let record = response.body.expect("record decoded");
    assert_eq!(record.id, "n1");
    assert_eq!(record.state, "started");
    assert_eq!(record.parent_keys, ParentKeys::new(["c1", "e1"]));
}

#[tokio::test]
async fn test_delete_missing_node_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("delete a node that does not exist", "", |mut i| {
        i.given("node n9 does not exist");
        i.request
            .method("DELETE")
            .path("/consortia/c1/environments/e1/nodes/n9")
            .header("authorization", "Bearer test-key");
        i.response
            .status(404)
            .header("content-type", "application/json")
            .json_body(json!({"errorMessage": "node not found"}));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let gateway = gateway_for(mock_server.url().as_str());

    let response = gateway
        .delete(ResourceKind::Node, "n9", &ParentKeys::new(["c1", "e1"]))
        .await
        .expect("Failed to send delete");

    assert!(response.is_not_found());
    assert!(response.body.is_none());
    assert!(response.raw.contains("node not found"));
}

#[tokio::test]
async fn test_list_zones_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("list environment zones", "", |mut i| {
        i.given("environment e1 has two zones");
        i.request
            .method("GET")
            .path("/consortia/c1/environments/e1/zones")
            .header("authorization", "Bearer test-key");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!([
                {"_id": "z1", "cloud": "aws", "region": "us-east-2", "state": "live"},
                {"_id": "z2", "cloud": "aws", "region": "eu-west-1", "state": "delete_pending"}
            ]));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let gateway = gateway_for(mock_server.url().as_str());

    let response = gateway
        .list(ResourceKind::EnvironmentZone, &ParentKeys::new(["c1", "e1"]))
        .await
        .expect("Failed to list zones");

    let records = response.body.expect("records decoded");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "z1");
    assert!(records[1].is_deleting());
}

#[tokio::test]
async fn test_upsert_destination_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("register a destination on an ID registry", "", |mut i| {
        i.given("ID registry service s1 exists");
        i.request
            .method("PUT")
            .path("/idregistry/s1/destinations/dest1")
            .header("authorization", "Bearer test-key")
            .header("content-type", "application/json")
            .json_body(json!({
                "name": "dest1",
                "kaleido_managed": true
            }));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "name": "dest1",
                "uri": "kld://app2app/dest1",
                "kaleido_managed": true
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let gateway = gateway_for(mock_server.url().as_str());

    let response = gateway
        .create(
            ResourceKind::Destination,
            &ParentKeys::new(["idregistry", "s1"]),
            &attrs(json!({"name": "dest1", "kaleido_managed": true})),
        )
        .await
        .expect("Failed to upsert destination");

    let record = response.body.expect("record decoded");
    assert_eq!(record.id, "dest1");
    assert_eq!(record.state, "");
}

#[tokio::test]
async fn test_reset_node_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("reset a node to apply an update", "", |mut i| {
        i.given("node n1 exists");
        i.request
            .method("PUT")
            .path("/consortia/c1/environments/e1/nodes/n1/reset")
            .header("authorization", "Bearer test-key")
            .header("content-type", "application/json")
            .json_body(json!({}));
        i.response.status(204);
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let gateway = gateway_for(mock_server.url().as_str());

    let response = gateway
        .reset(ResourceKind::Node, "n1", &ParentKeys::new(["c1", "e1"]))
        .await
        .expect("Failed to reset node");

    assert!(response.is_success());
}

#[tokio::test]
async fn test_register_identity_conflict_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("register an already registered membership identity", "", |mut i| {
        i.given("membership m1 is registered with ID registry r1");
        i.request
            .method("POST")
            .path("/idregistry/r1/identity")
            .header("authorization", "Bearer test-key")
            .header("content-type", "application/json")
            .json_body(json!({"membership_id": "m1"}));
        i.response
            .status(409)
            .header("content-type", "application/json")
            .json_body(json!({"errorMessage": "identity already registered"}));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let gateway = gateway_for(mock_server.url().as_str());

    let response = gateway
        .register_identity("r1", "m1")
        .await
        .expect("Failed to register identity");

    assert_eq!(response.status, 409);
    assert!(response.body.is_none());
}
