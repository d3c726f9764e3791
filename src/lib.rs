//! BaaS Reconciler Library
//!
//! Declaratively provisions blockchain-platform resources (consortia,
//! environments, nodes, services, zones, ...) on a remote, eventually
//! consistent control plane and keeps local declared state in step with what
//! the control plane reports.
//!
//! ## Overview
//!
//! 1. **Poller** - bounded exponential backoff under a deadline and cancellation
//! 2. **Gateway** - typed create/get/update/delete/list against the control plane
//! 3. **Reconciler** - one generic state machine driven by a per-kind strategy
//! 4. **Deduplicator** - adopts existing shared instances instead of creating duplicates
//! 5. **State** - declared-state document, file store, bridge, and the
//!    apply/refresh/destroy passes over a whole document
//!
//! Tests are included in the module files and under `tests/`.

pub mod config;
pub mod constants;
pub mod controller;
pub mod gateway;
pub mod observability;
pub mod prelude;
pub mod resource;
pub mod state;
