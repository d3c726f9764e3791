//! URL layout of the control plane API, per resource kind.

use super::GatewayError;
use crate::resource::{KindStrategy, ParentKeys, ResourceKind};

/// HTTP verb used to push changes to an existing record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    Post,
    Patch,
    Put,
}

impl WriteMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMethod::Post => "POST",
            WriteMethod::Patch => "PATCH",
            WriteMethod::Put => "PUT",
        }
    }
}

/// JSON field holding the record id
#[must_use]
pub fn id_field(kind: ResourceKind) -> &'static str {
    match kind {
        // Destinations are addressed by name
        ResourceKind::Destination => "name",
        _ => "_id",
    }
}

/// Method for creating a record of `kind`
#[must_use]
pub fn create_method(kind: ResourceKind) -> WriteMethod {
    match kind {
        ResourceKind::Destination => WriteMethod::Put,
        _ => WriteMethod::Post,
    }
}

/// Method for updating a record of `kind`
#[must_use]
pub fn update_method(kind: ResourceKind) -> WriteMethod {
    match kind {
        ResourceKind::Destination => WriteMethod::Put,
        _ => WriteMethod::Patch,
    }
}

/// Whether single-record reads go through a collection listing
///
/// The API has no item endpoint for these kinds; the record is found by id
/// in the listing instead.
#[must_use]
pub fn reads_via_listing(kind: ResourceKind) -> bool {
    matches!(kind, ResourceKind::Destination)
}

fn check_parents(kind: ResourceKind, parents: &ParentKeys) -> Result<(), GatewayError> {
    let labels = kind.strategy().parent_labels();
    if parents.len() != labels.len() {
        return Err(GatewayError::ParentKeys {
            kind,
            expected: labels.len(),
            labels: labels.join(", "),
            got: parents.len(),
        });
    }
    Ok(())
}

/// Collection path segments for `kind` under `parents`
///
/// Segments are raw; the gateway percent-encodes each one when it builds the
/// request URL, so ids may contain `/`, `?` or `#`.
///
/// # Errors
/// [`GatewayError::ParentKeys`] when the number of parents does not match
/// the kind
pub fn collection_segments(
    kind: ResourceKind,
    parents: &ParentKeys,
) -> Result<Vec<String>, GatewayError> {
    check_parents(kind, parents)?;
    let p = parents.as_slice();
    let under_consortium = |leaf: &str| vec!["consortia".to_string(), p[0].clone(), leaf.to_string()];
    let under_environment = |leaf: &str| {
        vec![
            "consortia".to_string(),
            p[0].clone(),
            "environments".to_string(),
            p[1].clone(),
            leaf.to_string(),
        ]
    };
    let segments = match kind {
        ResourceKind::Consortium => vec!["consortia".to_string()],
        ResourceKind::Environment => under_consortium("environments"),
        ResourceKind::Membership => under_consortium("memberships"),
        ResourceKind::Invitation => under_consortium("invitations"),
        ResourceKind::ConsortiumZone => under_consortium("zones"),
        ResourceKind::Node => under_environment("nodes"),
        ResourceKind::Service => under_environment("services"),
        ResourceKind::Configuration => under_environment("configurations"),
        ResourceKind::AppCreds => under_environment("appcreds"),
        ResourceKind::EnvironmentZone => under_environment("zones"),
        ResourceKind::Destination => vec![p[0].clone(), p[1].clone(), "destinations".to_string()],
    };
    Ok(segments)
}

/// Item path segments for record `id` of `kind`
///
/// # Errors
/// Same as [`collection_segments`]
pub fn item_segments(
    kind: ResourceKind,
    id: &str,
    parents: &ParentKeys,
) -> Result<Vec<String>, GatewayError> {
    let mut segments = collection_segments(kind, parents)?;
    segments.push(id.to_string());
    Ok(segments)
}

/// Segments of the endpoint that re-runs provisioning of record `id`
///
/// # Errors
/// Same as [`collection_segments`]
pub fn reset_segments(
    kind: ResourceKind,
    id: &str,
    parents: &ParentKeys,
) -> Result<Vec<String>, GatewayError> {
    let mut segments = item_segments(kind, id, parents)?;
    segments.push("reset".to_string());
    Ok(segments)
}

/// Segments of the membership verification endpoint
#[must_use]
pub fn membership_verification_segments(consortium_id: &str, membership_id: &str) -> Vec<String> {
    vec![
        "consortia".to_string(),
        consortium_id.to_string(),
        "memberships".to_string(),
        membership_id.to_string(),
        "verify".to_string(),
    ]
}

/// Segments of the ID registry identity endpoint
#[must_use]
pub fn registry_identity_segments(idregistry_id: &str) -> Vec<String> {
    vec![
        "idregistry".to_string(),
        idregistry_id.to_string(),
        "identity".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(segments: Result<Vec<String>, GatewayError>) -> Option<String> {
        segments.ok().map(|s| s.join("/"))
    }

    #[test]
    fn test_collection_paths() {
        let c = ParentKeys::new(["c1"]);
        let ce = ParentKeys::new(["c1", "e1"]);
        assert_eq!(
            joined(collection_segments(ResourceKind::Consortium, &ParentKeys::root())),
            Some("consortia".to_string())
        );
        assert_eq!(
            joined(collection_segments(ResourceKind::Membership, &c)),
            Some("consortia/c1/memberships".to_string())
        );
        assert_eq!(
            joined(collection_segments(ResourceKind::ConsortiumZone, &c)),
            Some("consortia/c1/zones".to_string())
        );
        assert_eq!(
            joined(collection_segments(ResourceKind::AppCreds, &ce)),
            Some("consortia/c1/environments/e1/appcreds".to_string())
        );
        assert_eq!(
            joined(collection_segments(
                ResourceKind::Destination,
                &ParentKeys::new(["idregistry", "s1"])
            )),
            Some("idregistry/s1/destinations".to_string())
        );
    }

    #[test]
    fn test_item_and_reset_paths() {
        let ce = ParentKeys::new(["c1", "e1"]);
        assert_eq!(
            joined(item_segments(ResourceKind::Node, "n1", &ce)),
            Some("consortia/c1/environments/e1/nodes/n1".to_string())
        );
        assert_eq!(
            joined(reset_segments(ResourceKind::Node, "n1", &ce)),
            Some("consortia/c1/environments/e1/nodes/n1/reset".to_string())
        );
    }

    #[test]
    fn test_membership_paths() {
        assert_eq!(
            membership_verification_segments("c1", "m1").join("/"),
            "consortia/c1/memberships/m1/verify"
        );
        assert_eq!(registry_identity_segments("r1").join("/"), "idregistry/r1/identity");
    }

    #[test]
    fn test_ids_stay_single_segments() {
        let segments = item_segments(
            ResourceKind::Destination,
            "a/b?c",
            &ParentKeys::new(["idregistry", "s1"]),
        )
        .unwrap_or_default();
        assert_eq!(segments.last().map(String::as_str), Some("a/b?c"));
        assert_eq!(segments.len(), 4);
    }

    #[test]
    fn test_wrong_parent_count_is_rejected() {
        let err = collection_segments(ResourceKind::Node, &ParentKeys::new(["c1"]))
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("node needs 2 parent key(s)"));
        assert!(err.contains("got 1"));
    }

    #[test]
    fn test_write_methods() {
        assert_eq!(update_method(ResourceKind::Node), WriteMethod::Patch);
        assert_eq!(update_method(ResourceKind::Destination), WriteMethod::Put);
        assert_eq!(create_method(ResourceKind::Environment), WriteMethod::Post);
        assert_eq!(id_field(ResourceKind::Destination), "name");
        assert_eq!(id_field(ResourceKind::Service), "_id");
    }
}
