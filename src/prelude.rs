//! Common imports for callers driving the reconciler.

pub use crate::config::{GatewayConfig, PollerConfig, TimeoutConfig};
pub use crate::controller::{
    Attempt, CallContext, DeleteOutcome, DoneReason, PollError, Poller, ReadOutcome,
    ReconcileError, Reconciler,
};
pub use crate::gateway::{ApiResponse, GatewayError, ResourceGateway, RestGateway};
pub use crate::resource::{
    Attributes, Convergence, DesiredSpec, IdentityKey, KindStrategy, ParentKeys, ResourceKind,
    ResourceRecord,
};
pub use crate::state::{ApplyReport, DeclaredResource, ReportRow, StateDocument, StateStore, SyncError};
