//! # Gateway Configuration
//!
//! Connection settings for the remote control plane API.

use crate::constants::{
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT, ENV_API_KEY, ENV_API_URL,
};
use anyhow::{Context, Result};
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{env_var_or_default, env_var_or_default_str};

/// Bearer token for the control plane, wiped from memory on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Settings for [`crate::gateway::rest::RestGateway`]
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the control plane, e.g. `https://console.kaleido.io/api/v1`
    pub api_url: String,
    pub api_key: ApiKey,
    pub user_agent: String,
    /// Per-request timeout; convergence deadlines are enforced separately
    pub request_timeout: Duration,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: ApiKey::new(api_key),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Load configuration from `KALEIDO_*` environment variables
    ///
    /// # Errors
    /// Returns an error if the API URL or API key is unset or empty
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var(ENV_API_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("{ENV_API_URL} must be set to the control plane URL"))?;
        let api_key = std::env::var(ENV_API_KEY)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("{ENV_API_KEY} must be set"))?;

        Ok(Self {
            api_url,
            api_key: ApiKey::new(api_key),
            user_agent: env_var_or_default_str("KALEIDO_USER_AGENT", DEFAULT_USER_AGENT),
            request_timeout: Duration::from_secs(env_var_or_default(
                "KALEIDO_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
        })
    }
}
