//! Common test utilities
//!
//! Provides rustls setup for the Pact tests and a scripted in-memory gateway
//! for reconciler tests.

#![allow(dead_code)]

use async_trait::async_trait;
use baas_reconciler::gateway::{ApiResponse, GatewayError, ResourceGateway};
use baas_reconciler::resource::{Attributes, ParentKeys, ResourceKind, ResourceRecord};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// Build a record the way the control plane would report it
pub fn record(kind: ResourceKind, id: &str, state: &str, parents: &[&str]) -> ResourceRecord {
    let mut record = ResourceRecord::new(kind, ParentKeys::new(parents.iter().copied()));
    record.id = id.to_string();
    record.state = state.to_string();
    record
}

/// Zone record with a cloud/region identity
pub fn zone(kind: ResourceKind, id: &str, state: &str, region: &str, parents: &[&str]) -> ResourceRecord {
    let mut zone = record(kind, id, state, parents);
    zone.attributes.insert("cloud".to_string(), json!("aws"));
    zone.attributes.insert("region".to_string(), json!(region));
    zone
}

/// JSON object literal to attributes
pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// One scripted gateway reply
#[derive(Debug, Clone)]
pub enum Reply {
    Record(ResourceRecord),
    Records(Vec<ResourceRecord>),
    Status(u16, String),
    Empty(u16),
    Transport(String),
    /// Never answers; only the call context can end the call
    Hang,
}

/// Gateway answering from per-operation scripts
///
/// Each operation pops its next reply; the last reply of a script repeats
/// forever. Every call is counted by operation name and logged in order with
/// its kind and target id.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    scripts: Mutex<HashMap<&'static str, VecDeque<Reply>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    sent: Mutex<Vec<(&'static str, Attributes)>>,
    log: Mutex<Vec<(&'static str, ResourceKind, String)>>,
    read_parents: Mutex<Vec<ParentKeys>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, operation: &'static str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert(operation, replies.into());
        self
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls lock").values().sum()
    }

    /// Payloads sent with create and update calls
    pub fn sent(&self) -> Vec<(&'static str, Attributes)> {
        self.sent.lock().expect("sent lock").clone()
    }

    /// Operation names in call order
    pub fn order(&self) -> Vec<&'static str> {
        self.log
            .lock()
            .expect("log lock")
            .iter()
            .map(|(operation, _, _)| *operation)
            .collect()
    }

    /// Every call as (operation, kind, target id) in call order
    pub fn log(&self) -> Vec<(&'static str, ResourceKind, String)> {
        self.log.lock().expect("log lock").clone()
    }

    /// Parent keys passed to every get, in call order
    pub fn read_parents(&self) -> Vec<ParentKeys> {
        self.read_parents.lock().expect("read parents lock").clone()
    }

    async fn next(&self, operation: &'static str, kind: ResourceKind, id: &str) -> Reply {
        self.log
            .lock()
            .expect("log lock")
            .push((operation, kind, id.to_string()));
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(operation)
            .or_insert(0) += 1;
        let reply = {
            let mut scripts = self.scripts.lock().expect("scripts lock");
            let script = scripts.entry(operation).or_default();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };
        let reply = reply.unwrap_or_else(|| panic!("no reply scripted for {operation}"));
        if matches!(reply, Reply::Hang) {
            std::future::pending::<()>().await;
        }
        reply
    }

    async fn record_reply(
        &self,
        operation: &'static str,
        kind: ResourceKind,
        id: &str,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError> {
        match self.next(operation, kind, id).await {
            Reply::Record(record) => Ok(ApiResponse::new(200, Some(record), "")),
            Reply::Status(status, body) => Ok(ApiResponse::new(status, None, body)),
            Reply::Empty(status) => Ok(ApiResponse::new(status, None, "")),
            Reply::Transport(message) => Err(transport(message)),
            other => panic!("{operation} cannot answer with {other:?}"),
        }
    }

    async fn unit_reply(
        &self,
        operation: &'static str,
        kind: ResourceKind,
        id: &str,
    ) -> Result<ApiResponse<()>, GatewayError> {
        match self.next(operation, kind, id).await {
            Reply::Empty(status) if (200..300).contains(&status) => {
                Ok(ApiResponse::new(status, Some(()), ""))
            }
            Reply::Empty(status) => Ok(ApiResponse::new(status, None, "")),
            Reply::Status(status, body) => Ok(ApiResponse::new(status, None, body)),
            Reply::Transport(message) => Err(transport(message)),
            other => panic!("{operation} cannot answer with {other:?}"),
        }
    }
}

fn transport(message: String) -> GatewayError {
    GatewayError::Transport {
        url: "memory://gateway".to_string(),
        message,
    }
}

#[async_trait]
impl ResourceGateway for ScriptedGateway {
    async fn create(
        &self,
        kind: ResourceKind,
        _parents: &ParentKeys,
        attributes: &Attributes,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError> {
        self.sent
            .lock()
            .expect("sent lock")
            .push(("create", attributes.clone()));
        self.record_reply("create", kind, "").await
    }

    async fn get(
        &self,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError> {
        self.read_parents
            .lock()
            .expect("read parents lock")
            .push(parents.clone());
        self.record_reply("get", kind, id).await
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        _parents: &ParentKeys,
        attributes: &Attributes,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError> {
        self.sent
            .lock()
            .expect("sent lock")
            .push(("update", attributes.clone()));
        self.record_reply("update", kind, id).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
        _parents: &ParentKeys,
    ) -> Result<ApiResponse<()>, GatewayError> {
        self.unit_reply("delete", kind, id).await
    }

    async fn list(
        &self,
        kind: ResourceKind,
        _parents: &ParentKeys,
    ) -> Result<ApiResponse<Vec<ResourceRecord>>, GatewayError> {
        match self.next("list", kind, "").await {
            Reply::Records(records) => Ok(ApiResponse::new(200, Some(records), "")),
            Reply::Status(status, body) => Ok(ApiResponse::new(status, None, body)),
            Reply::Transport(message) => Err(transport(message)),
            other => panic!("list cannot answer with {other:?}"),
        }
    }

    async fn reset(
        &self,
        kind: ResourceKind,
        id: &str,
        _parents: &ParentKeys,
    ) -> Result<ApiResponse<()>, GatewayError> {
        self.unit_reply("reset", kind, id).await
    }

    async fn verify_membership(
        &self,
        _consortium_id: &str,
        membership_id: &str,
    ) -> Result<ApiResponse<()>, GatewayError> {
        self.unit_reply("verify", ResourceKind::Membership, membership_id)
            .await
    }

    async fn register_identity(
        &self,
        _idregistry_id: &str,
        membership_id: &str,
    ) -> Result<ApiResponse<()>, GatewayError> {
        self.unit_reply("register", ResourceKind::Membership, membership_id)
            .await
    }
}
