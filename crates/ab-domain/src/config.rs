//! Client configuration resolution.
//!
//! Resolution order (outermost wins): explicit struct passed to the client
//! constructor, environment variables, a local `.env` file, built-in
//! defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_region_id() -> String {
    "cn-shanghai".into()
}
fn default_endpoint() -> String {
    "wuyingai.cn-shanghai.aliyuncs.com".into()
}
fn default_timeout_ms() -> u64 {
    60_000
}

/// Resolved connection configuration for the AgentBay client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentBayConfig {
    #[serde(default = "default_region_id")]
    pub region_id: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AgentBayConfig {
    fn default() -> Self {
        Self {
            region_id: default_region_id(),
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Overrides a caller may pass explicitly to the client constructor. Every
/// field is optional; unset fields fall through to the next resolution tier.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub region_id: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl AgentBayConfig {
    /// Resolve configuration using the full precedence chain described in
    /// the module docs. Loads a `.env` file from the current directory (if
    /// present) as a side effect, the way a one-shot CLI tool would at
    /// startup; this is a no-op if no `.env` file exists.
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        // Load .env into the process environment before reading env vars.
        // Errors (missing file) are expected and ignored.
        let _ = dotenvy::dotenv();
        Self::resolve_from(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration against an explicit environment lookup
    /// function instead of the process environment. Lets embedders
    /// (multi-tenant hosts, tests) avoid touching global process state.
    pub fn resolve_from(
        overrides: ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let region_id = overrides
            .region_id
            .or_else(|| env("AGENTBAY_REGION_ID"))
            .unwrap_or_else(default_region_id);

        let endpoint = overrides
            .endpoint
            .or_else(|| env("AGENTBAY_ENDPOINT"))
            .unwrap_or_else(default_endpoint);

        let timeout_ms = overrides
            .timeout_ms
            .or_else(|| env("AGENTBAY_TIMEOUT_MS").and_then(|v| v.parse().ok()))
            .unwrap_or_else(default_timeout_ms);

        Self {
            region_id,
            endpoint,
            timeout_ms,
        }
    }
}

/// Resolve the API key: explicit argument, else `AGENTBAY_API_KEY`.
/// Absence of both is fatal (`ConfigError`) at client construction.
pub fn resolve_api_key(explicit: Option<String>) -> Result<String> {
    resolve_api_key_from(explicit, |key| std::env::var(key).ok())
}

pub fn resolve_api_key_from(
    explicit: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    if let Some(key) = explicit {
        if !key.is_empty() {
            return Ok(key);
        }
    }
    env("AGENTBAY_API_KEY").filter(|v| !v.is_empty()).ok_or_else(|| {
        Error::Config(
            "no API key configured: pass one explicitly or set AGENTBAY_API_KEY".into(),
        )
    })
}
