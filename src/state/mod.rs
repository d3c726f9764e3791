//! # Declared State
//!
//! The local record of what should exist and what was last seen remotely.
//!
//! A state document is an ordered list of declared resources. Parents are
//! either literal ids or `@name` references to an earlier resource in the
//! same document, resolved to that resource's remote id when it is used.
//!
//! ```yaml
//! resources:
//!   - name: consortium
//!     kind: consortium
//!     attributes: { name: demo, description: demo consortium }
//!   - name: env
//!     kind: environment
//!     parents: ["@consortium"]
//!     attributes: { name: dev, env_type: quorum, consensus_type: raft }
//! ```

pub mod bridge;
pub mod file;
pub mod sync;

pub use file::FileStateStore;
pub use sync::{ApplyReport, ReportRow, SyncError};

use crate::resource::{Attributes, IdentityKey, ResourceKind};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix marking a parent entry as a reference to another resource
pub const REFERENCE_PREFIX: char = '@';

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("invalid state document: {0}")]
    Invalid(String),
}

/// Last observed remote state of a declared resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActualState {
    pub id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[schemars(with = "String")]
    pub observed_at: DateTime<Utc>,
}

/// One resource the caller wants to exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DeclaredResource {
    /// Unique within the document; target of `@name` references
    pub name: String,
    pub kind: ResourceKind,
    /// Ancestor ids or `@name` references, outermost first
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub shared_deployment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_key: Option<IdentityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<ActualState>,
}

impl DeclaredResource {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parents: Vec::new(),
            attributes: Attributes::new(),
            shared_deployment: false,
            identity_key: None,
            actual: None,
        }
    }

    /// Remote id, if the resource has been provisioned
    #[must_use]
    pub fn actual_id(&self) -> Option<&str> {
        self.actual
            .as_ref()
            .map(|actual| actual.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// Ordered set of declared resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StateDocument {
    #[serde(default)]
    pub resources: Vec<DeclaredResource>,
}

impl StateDocument {
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&DeclaredResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.name == name)
    }

    /// Check names are unique and references point at earlier resources
    ///
    /// # Errors
    /// [`StateError::Invalid`] describing the first problem found
    pub fn validate(&self) -> Result<(), StateError> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.name.trim().is_empty() {
                return Err(StateError::Invalid(format!(
                    "a {} resource has an empty name",
                    resource.kind
                )));
            }
            for parent in &resource.parents {
                if let Some(target) = parent.strip_prefix(REFERENCE_PREFIX) {
                    if !seen.contains(target) {
                        return Err(StateError::Invalid(format!(
                            "resource '{}' references '{}', which is not declared before it",
                            resource.name, target
                        )));
                    }
                }
            }
            if !seen.insert(resource.name.as_str()) {
                return Err(StateError::Invalid(format!(
                    "resource name '{}' is declared more than once",
                    resource.name
                )));
            }
        }
        Ok(())
    }

    /// JSON schema of the document format
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(StateDocument)
    }
}

/// Persistence for a [`StateDocument`]
pub trait StateStore: Send + Sync {
    /// # Errors
    /// Read or parse failures
    fn load(&self) -> Result<StateDocument, StateError>;

    /// # Errors
    /// Serialization or write failures
    fn save(&self, document: &StateDocument) -> Result<(), StateError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> StateDocument {
        serde_yaml::from_str(yaml).expect("parse state document")
    }

    #[test]
    fn test_parse_minimal_document() {
        let document = parse(
            r#"
resources:
  - name: consortium
    kind: consortium
    attributes:
      name: demo
  - name: env
    kind: environment
    parents: ["@consortium"]
    attributes:
      name: dev
      env_type: quorum
"#,
        );
        assert_eq!(document.resources.len(), 2);
        assert_eq!(document.resources[1].kind, ResourceKind::Environment);
        assert!(!document.resources[1].shared_deployment);
        assert!(document.validate().is_ok());
    }

    #[test]
    fn test_forward_reference_is_invalid() {
        let document = parse(
            r#"
resources:
  - name: env
    kind: environment
    parents: ["@consortium"]
  - name: consortium
    kind: consortium
"#,
        );
        let err = document.validate().err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("not declared before it"));
    }

    #[test]
    fn test_duplicate_names_are_invalid() {
        let document = parse(
            r#"
resources:
  - name: a
    kind: consortium
  - name: a
    kind: consortium
"#,
        );
        assert!(document.validate().is_err());
    }

    #[test]
    fn test_schema_names_resources() {
        let schema = serde_json::to_string(&StateDocument::json_schema()).unwrap_or_default();
        assert!(schema.contains("resources"));
        assert!(schema.contains("shared_deployment"));
    }
}
