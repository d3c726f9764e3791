//! # Gateway
//!
//! Typed access to the remote control plane.
//!
//! The gateway reports what the remote side said and nothing more: a status
//! code plus the decoded body. Deciding whether a status is fatal, drift, or
//! success belongs to the reconciler.
//!
//! - `paths`: per-kind URL layout
//! - `rest`: HTTP implementation over `reqwest`

pub mod paths;
pub mod rest;

pub use rest::RestGateway;

use crate::resource::{Attributes, ParentKeys, ResourceKind, ResourceRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised when a gateway call could not complete
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("failed to decode {kind} response (status {status}): {message}")]
    Decode {
        kind: ResourceKind,
        status: u16,
        message: String,
    },

    #[error("{kind} payload has no '{field}' to address the record by")]
    MissingId {
        kind: ResourceKind,
        field: &'static str,
    },

    #[error("invalid base URL {url}: {message}")]
    BaseUrl { url: String, message: String },

    #[error("{kind} needs {expected} parent key(s) ({labels}), got {got}")]
    ParentKeys {
        kind: ResourceKind,
        expected: usize,
        labels: String,
        got: usize,
    },
}

/// Status plus decoded body of one remote call
///
/// `body` is only decoded for 2xx responses; `raw` always carries the
/// response text so callers can quote it in errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: Option<T>,
    pub raw: String,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn new(status: u16, body: Option<T>, raw: impl Into<String>) -> Self {
        Self {
            status,
            body,
            raw: raw.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Remote resource operations used by the reconciler
///
/// Implementations must be safe to share between concurrent reconciliation
/// calls. Parent keys are passed in the order given by
/// [`crate::resource::KindStrategy::parent_labels`].
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    async fn create(
        &self,
        kind: ResourceKind,
        parents: &ParentKeys,
        attributes: &Attributes,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError>;

    async fn get(
        &self,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError>;

    async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
        attributes: &Attributes,
    ) -> Result<ApiResponse<ResourceRecord>, GatewayError>;

    async fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
    ) -> Result<ApiResponse<()>, GatewayError>;

    async fn list(
        &self,
        kind: ResourceKind,
        parents: &ParentKeys,
    ) -> Result<ApiResponse<Vec<ResourceRecord>>, GatewayError>;

    /// Ask the remote side to re-run provisioning of record `id`
    async fn reset(
        &self,
        kind: ResourceKind,
        id: &str,
        parents: &ParentKeys,
    ) -> Result<ApiResponse<()>, GatewayError>;

    /// Create a self-signed verification proof for a membership
    async fn verify_membership(
        &self,
        consortium_id: &str,
        membership_id: &str,
    ) -> Result<ApiResponse<()>, GatewayError>;

    /// Register a membership's identity with an ID registry service
    async fn register_identity(
        &self,
        idregistry_id: &str,
        membership_id: &str,
    ) -> Result<ApiResponse<()>, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_status_helpers() {
        let ok: ApiResponse<()> = ApiResponse::new(201, Some(()), "");
        assert!(ok.is_success());
        assert!(!ok.is_not_found());

        let missing: ApiResponse<()> = ApiResponse::new(404, None, "not found");
        assert!(!missing.is_success());
        assert!(missing.is_not_found());

        let conflict: ApiResponse<()> = ApiResponse::new(409, None, "conflict");
        assert!(!conflict.is_success());
        assert!(!conflict.is_not_found());
    }
}
