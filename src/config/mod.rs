//! # Configuration
//!
//! Explicit configuration values for the gateway, the poller and operation
//! deadlines. Nothing in the core reads the environment on its own; callers
//! build these values (optionally with `from_env`) and pass them in.

pub mod gateway;
pub mod poller;

pub use gateway::{ApiKey, GatewayConfig};
pub use poller::{PollerConfig, TimeoutConfig};

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
