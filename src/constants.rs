//! # Constants
//!
//! Shared defaults used throughout the reconciler.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Delay before the second poll attempt (milliseconds)
pub const DEFAULT_POLL_INITIAL_DELAY_MS: u64 = 500;

/// Upper bound on any single poll delay (milliseconds)
pub const DEFAULT_POLL_MAX_DELAY_MS: u64 = 5_000;

/// Multiplier applied to the poll delay after every sleep
pub const DEFAULT_POLL_FACTOR: f64 = 2.0;

/// Default deadline for a create, update or delete call (seconds)
/// Matches the ten minute resource timeouts of the platform provider
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 600;

/// Default per-request HTTP timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every gateway request
pub const DEFAULT_USER_AGENT: &str = concat!("baas-reconciler/", env!("CARGO_PKG_VERSION"));

/// Environment variable holding the control plane base URL
pub const ENV_API_URL: &str = "KALEIDO_API";

/// Environment variable holding the control plane API key
pub const ENV_API_KEY: &str = "KALEIDO_API_KEY";

/// Remote states that mean a record is on its way out and must not be adopted
pub const DELETION_STATES: &[&str] = &["delete_pending", "deleting", "deleted"];
