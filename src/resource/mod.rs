//! # Resource Model
//!
//! Records as the remote control plane reports them, and the desired
//! configuration the caller asks the reconciler to converge onto.

pub mod kind;

pub use kind::{Convergence, KindStrategy, ResourceKind};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Kind-specific JSON attributes
pub type Attributes = Map<String, Value>;

/// Attribute subset identifying a shared instance, e.g. `{cloud, region}`
pub type IdentityKey = BTreeMap<String, Value>;

/// Ordered ancestor identifiers, outermost first
/// (e.g. `[consortium_id, environment_id]`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ParentKeys(Vec<String>);

impl ParentKeys {
    #[must_use]
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

impl std::fmt::Display for ParentKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0.join("/"))
        }
    }
}

impl<S: Into<String>> FromIterator<S> for ParentKeys {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// One provisioned entity as reported by the control plane
///
/// `id` is empty until the remote side assigns one and never changes after.
/// `parent_keys` are fixed for the life of the record; changing any of them
/// means destroying and recreating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    pub kind: ResourceKind,
    /// Remote lifecycle label, e.g. `initializing`, `started`, `live`
    pub state: String,
    pub attributes: Attributes,
    pub parent_keys: ParentKeys,
}

impl ResourceRecord {
    #[must_use]
    pub fn new(kind: ResourceKind, parent_keys: ParentKeys) -> Self {
        Self {
            id: String::new(),
            kind,
            state: String::new(),
            attributes: Attributes::new(),
            parent_keys,
        }
    }

    /// Whether the remote side reports this record as being torn down
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        let state = self.state.to_ascii_lowercase();
        crate::constants::DELETION_STATES.contains(&state.as_str())
            || self.attributes.get("deleted").and_then(Value::as_bool) == Some(true)
    }

    /// Whether every entry of `identity` matches an attribute exactly
    #[must_use]
    pub fn matches_identity(&self, identity: &IdentityKey) -> bool {
        identity
            .iter()
            .all(|(key, expected)| self.attributes.get(key) == Some(expected))
    }
}

/// The caller's intended configuration for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredSpec {
    pub kind: ResourceKind,
    pub parent_keys: ParentKeys,
    pub attributes: Attributes,
    /// Other independent callers may rely on the same remote entity
    pub shared_deployment: bool,
    /// Explicit identity for shared adoption; derived from the kind when unset
    pub identity_key: Option<IdentityKey>,
}

impl DesiredSpec {
    #[must_use]
    pub fn new(kind: ResourceKind, parent_keys: ParentKeys, attributes: Attributes) -> Self {
        Self {
            kind,
            parent_keys,
            attributes,
            shared_deployment: false,
            identity_key: None,
        }
    }

    #[must_use]
    pub fn shared(mut self, identity_key: Option<IdentityKey>) -> Self {
        self.shared_deployment = true;
        self.identity_key = identity_key;
        self
    }
}
