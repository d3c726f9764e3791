//! # Resource Kinds
//!
//! Per-kind strategies plugged into the generic reconciler.
//!
//! Every kind answers the same core questions: how desired attributes map to
//! the remote payload, which remote state means "provisioned", whether the
//! remote side accepts in-place updates, and which attributes identify a
//! shared instance. A few kinds add lifecycle quirks on top:
//!
//! - nodes are reset after an update so the new settings take effect
//! - zones and services are never deleted remotely, only forgotten
//! - environment zones reuse a live zone in the same cloud and region
//! - destinations check (and optionally verify) the owning membership first

use super::{Attributes, DesiredSpec, IdentityKey};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource types managed on the control plane
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Consortium,
    Environment,
    Membership,
    Invitation,
    /// Deployment zone shared by a whole consortium
    ConsortiumZone,
    Node,
    Service,
    Configuration,
    AppCreds,
    /// Deployment zone inside one environment
    EnvironmentZone,
    Destination,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Consortium,
        ResourceKind::Environment,
        ResourceKind::Membership,
        ResourceKind::Invitation,
        ResourceKind::ConsortiumZone,
        ResourceKind::Node,
        ResourceKind::Service,
        ResourceKind::Configuration,
        ResourceKind::AppCreds,
        ResourceKind::EnvironmentZone,
        ResourceKind::Destination,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Consortium => "consortium",
            ResourceKind::Environment => "environment",
            ResourceKind::Membership => "membership",
            ResourceKind::Invitation => "invitation",
            ResourceKind::ConsortiumZone => "consortium_zone",
            ResourceKind::Node => "node",
            ResourceKind::Service => "service",
            ResourceKind::Configuration => "configuration",
            ResourceKind::AppCreds => "app_creds",
            ResourceKind::EnvironmentZone => "environment_zone",
            ResourceKind::Destination => "destination",
        }
    }

    /// Built-in strategy for this kind
    #[must_use]
    pub fn strategy(&self) -> &'static BuiltinKind {
        match self {
            ResourceKind::Consortium => &CONSORTIUM,
            ResourceKind::Environment => &ENVIRONMENT,
            ResourceKind::Membership => &MEMBERSHIP,
            ResourceKind::Invitation => &INVITATION,
            ResourceKind::ConsortiumZone => &CONSORTIUM_ZONE,
            ResourceKind::Node => &NODE,
            ResourceKind::Service => &SERVICE,
            ResourceKind::Configuration => &CONFIGURATION,
            ResourceKind::AppCreds => &APP_CREDS,
            ResourceKind::EnvironmentZone => &ENVIRONMENT_ZONE,
            ResourceKind::Destination => &DESTINATION,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What "provisioned" means for a kind after the create call returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// The create response is final
    None,
    /// Poll until a read succeeds
    Exists,
    /// Poll until the remote `state` equals this label
    State(&'static str),
}

/// Kind-specific behavior for [`crate::controller::reconciler::Reconciler`]
pub trait KindStrategy: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> ResourceKind;

    /// Names of the ancestor keys, outermost first
    fn parent_labels(&self) -> &'static [&'static str];

    fn convergence(&self) -> Convergence;

    /// Whether the remote side accepts in-place updates
    fn is_mutable(&self) -> bool {
        false
    }

    /// Whether an update sends the record back through provisioning
    fn reconverge_on_update(&self) -> bool {
        false
    }

    /// Whether a successful update must be followed by a remote reset
    fn reset_after_update(&self) -> bool {
        false
    }

    /// Whether delete only forgets the record locally, for kinds the remote
    /// side tears down together with their parent
    fn detach_on_delete(&self) -> bool {
        false
    }

    /// Whether create reuses a matching live instance even when the caller
    /// did not mark the resource as shared
    fn adopt_existing(&self) -> bool {
        false
    }

    /// Whether create and update first check the owning membership
    fn verifies_membership(&self) -> bool {
        false
    }

    /// Declared attributes used locally and never sent to the remote side
    fn local_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Payload attributes that identify a shared instance
    fn identity_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Map desired attributes onto the remote create payload
    fn create_payload(&self, desired: &DesiredSpec) -> Attributes {
        desired.attributes.clone()
    }

    /// Map desired attributes onto the remote update payload
    fn update_payload(&self, desired: &DesiredSpec) -> Attributes {
        self.create_payload(desired)
    }

    /// Identity used to find an adoptable shared instance
    ///
    /// An explicit key on the [`DesiredSpec`] wins. Otherwise the key is built from
    /// [`KindStrategy::identity_attributes`] of the create payload, and is
    /// `None` if the kind has none or any of them is missing.
    fn identity_key(&self, desired: &DesiredSpec) -> Option<IdentityKey> {
        if let Some(explicit) = &desired.identity_key {
            return Some(explicit.clone());
        }
        let names = self.identity_attributes();
        if names.is_empty() {
            return None;
        }
        let payload = self.create_payload(desired);
        names
            .iter()
            .map(|name| {
                payload
                    .get(*name)
                    .filter(|v| !v.is_null())
                    .map(|v| ((*name).to_string(), v.clone()))
            })
            .collect()
    }
}

/// Table-driven strategy used for every built-in kind
#[derive(Debug)]
pub struct BuiltinKind {
    kind: ResourceKind,
    parents: &'static [&'static str],
    convergence: Convergence,
    mutable: bool,
    reconverge_on_update: bool,
    identity: &'static [&'static str],
    /// `(declared name, remote name)` pairs
    renames: &'static [(&'static str, &'static str)],
    /// Values filled in when the caller leaves them out
    defaults: fn() -> Vec<(&'static str, Value)>,
    /// Attributes the remote side accepts on update; empty means all
    updatable: &'static [&'static str],
    reset_after_update: bool,
    detach_on_delete: bool,
    adopt_existing: bool,
    verifies_membership: bool,
    /// Declared attributes stripped from every payload
    local_only: &'static [&'static str],
}

fn no_defaults() -> Vec<(&'static str, Value)> {
    Vec::new()
}

impl BuiltinKind {
    fn map_attributes(&self, desired: &Attributes) -> Attributes {
        let mut payload = Attributes::new();
        for (key, value) in desired {
            if self.local_only.contains(&key.as_str()) {
                continue;
            }
            let remote = self
                .renames
                .iter()
                .find(|(declared, _)| declared == key)
                .map_or(key.as_str(), |(_, remote)| *remote);
            payload.insert(remote.to_string(), value.clone());
        }
        for (key, value) in (self.defaults)() {
            payload.entry(key.to_string()).or_insert(value);
        }
        payload
    }
}

impl KindStrategy for BuiltinKind {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn parent_labels(&self) -> &'static [&'static str] {
        self.parents
    }

    fn convergence(&self) -> Convergence {
        self.convergence
    }

    fn is_mutable(&self) -> bool {
        self.mutable
    }

    fn reconverge_on_update(&self) -> bool {
        self.reconverge_on_update
    }

    fn reset_after_update(&self) -> bool {
        self.reset_after_update
    }

    fn detach_on_delete(&self) -> bool {
        self.detach_on_delete
    }

    fn adopt_existing(&self) -> bool {
        self.adopt_existing
    }

    fn verifies_membership(&self) -> bool {
        self.verifies_membership
    }

    fn local_attributes(&self) -> &'static [&'static str] {
        self.local_only
    }

    fn identity_attributes(&self) -> &'static [&'static str] {
        self.identity
    }

    fn create_payload(&self, desired: &DesiredSpec) -> Attributes {
        self.map_attributes(&desired.attributes)
    }

    fn update_payload(&self, desired: &DesiredSpec) -> Attributes {
        let payload = self.map_attributes(&desired.attributes);
        if self.updatable.is_empty() {
            return payload;
        }
        payload
            .into_iter()
            .filter(|(key, _)| self.updatable.contains(&key.as_str()))
            .collect()
    }
}

const CONSORTIUM_PARENT: &[&str] = &["consortium_id"];
const ENVIRONMENT_PARENTS: &[&str] = &["consortium_id", "environment_id"];
const ZONE_IDENTITY: &[&str] = &["cloud", "region"];

static CONSORTIUM: BuiltinKind = BuiltinKind {
    kind: ResourceKind::Consortium,
    parents: &[],
    convergence: Convergence::None,
    mutable: false,
    reconverge_on_update: false,
    identity: &[],
    renames: &[],
    defaults: no_defaults,
    updatable: &[],
    reset_after_update: false,
    detach_on_delete: false,
    adopt_existing: false,
    verifies_membership: false,
    local_only: &[],
};

static ENVIRONMENT: BuiltinKind = BuiltinKind {
    kind: ResourceKind::Environment,
    parents: CONSORTIUM_PARENT,
    convergence: Convergence::State("live"),
    mutable: false,
    reconverge_on_update: false,
    identity: &[],
    renames: &[("env_type", "provider")],
    defaults: no_defaults,
    updatable: &[],
    reset_after_update: false,
    detach_on_delete: false,
    adopt_existing: false,
    verifies_membership: false,
    local_only: &[],
};

static MEMBERSHIP: BuiltinKind = BuiltinKind {
    kind: ResourceKind::Membership,
    parents: CONSORTIUM_PARENT,
    convergence: Convergence::None,
    mutable: true,
    reconverge_on_update: false,
    identity: &[],
    renames: &[],
    defaults: no_defaults,
    updatable: &["org_name"],
    reset_after_update: false,
    detach_on_delete: false,
    adopt_existing: false,
    verifies_membership: false,
    local_only: &[],
};

static INVITATION: BuiltinKind = BuiltinKind {
    kind: ResourceKind::Invitation,
    parents: CONSORTIUM_PARENT,
    convergence: Convergence::None,
    mutable: true,
    reconverge_on_update: false,
    identity: &[],
    renames: &[],
    defaults: no_defaults,
    updatable: &[],
    reset_after_update: false,
    detach_on_delete: false,
    adopt_existing: false,
    verifies_membership: false,
    local_only: &[],
};

static CONSORTIUM_ZONE: BuiltinKind = BuiltinKind {
    kind: ResourceKind::ConsortiumZone,
    parents: CONSORTIUM_PARENT,
    convergence: Convergence::Exists,
    mutable: false,
    reconverge_on_update: false,
    identity: ZONE_IDENTITY,
    renames: &[],
    defaults: no_defaults,
    updatable: &[],
    reset_after_update: false,
    detach_on_delete: true,
    adopt_existing: false,
    verifies_membership: false,
    local_only: &[],
};

fn node_defaults() -> Vec<(&'static str, Value)> {
    vec![("role", Value::from("validator"))]
}

static NODE: BuiltinKind = BuiltinKind {
    kind: ResourceKind::Node,
    parents: ENVIRONMENT_PARENTS,
    convergence: Convergence::State("started"),
    mutable: true,
    reconverge_on_update: true,
    identity: &[],
    renames: &[],
    defaults: node_defaults,
    updatable: &[
        "name",
        "size",
        "kms_id",
        "opsmetric_id",
        "backup_id",
        "networking_id",
        "node_config_id",
        "baf_id",
    ],
    reset_after_update: true,
    detach_on_delete: false,
    adopt_existing: false,
    verifies_membership: false,
    local_only: &[],
};

static SERVICE: BuiltinKind = BuiltinKind {
    kind: ResourceKind::Service,
    parents: ENVIRONMENT_PARENTS,
    convergence: Convergence::State("started"),
    mutable: false,
    reconverge_on_update: false,
    identity: &["service"],
    renames: &[("service_type", "service")],
    defaults: no_defaults,
    updatable: &[],
    reset_after_update: false,
    detach_on_delete: true,
    adopt_existing: false,
    verifies_membership: false,
    local_only: &[],
};

static CONFIGURATION: BuiltinKind = BuiltinKind {
    kind: ResourceKind::Configuration,
    parents: ENVIRONMENT_PARENTS,
    convergence: Convergence::Exists,
    mutable: false,
    reconverge_on_update: false,
    identity: &[],
    renames: &[],
    defaults: no_defaults,
    updatable: &[],
    reset_after_update: false,
    detach_on_delete: false,
    adopt_existing: false,
    verifies_membership: false,
    local_only: &[],
};

static APP_CREDS: BuiltinKind = BuiltinKind {
    kind: ResourceKind::AppCreds,
    parents: ENVIRONMENT_PARENTS,
    convergence: Convergence::None,
    mutable: false,
    reconverge_on_update: false,
    identity: &[],
    renames: &[],
    defaults: no_defaults,
    updatable: &[],
    reset_after_update: false,
    detach_on_delete: false,
    adopt_existing: false,
    verifies_membership: false,
    local_only: &[],
};

static ENVIRONMENT_ZONE: BuiltinKind = BuiltinKind {
    kind: ResourceKind::EnvironmentZone,
    parents: ENVIRONMENT_PARENTS,
    convergence: Convergence::Exists,
    mutable: true,
    reconverge_on_update: false,
    identity: ZONE_IDENTITY,
    renames: &[],
    defaults: no_defaults,
    updatable: &["name"],
    reset_after_update: false,
    detach_on_delete: true,
    adopt_existing: true,
    verifies_membership: false,
    local_only: &[],
};

/// Membership wiring for a destination; consumed before the upsert
const DESTINATION_LOCAL: &[&str] = &[
    "consortium_id",
    "membership_id",
    "idregistry_id",
    "auto_verify_membership",
];

fn destination_defaults() -> Vec<(&'static str, Value)> {
    vec![("kaleido_managed", Value::from(true))]
}

static DESTINATION: BuiltinKind = BuiltinKind {
    kind: ResourceKind::Destination,
    parents: &["service_type", "service_id"],
    convergence: Convergence::None,
    mutable: true,
    reconverge_on_update: false,
    identity: &[],
    renames: &[],
    defaults: destination_defaults,
    updatable: &[],
    reset_after_update: false,
    detach_on_delete: false,
    adopt_existing: false,
    verifies_membership: true,
    local_only: DESTINATION_LOCAL,
};
