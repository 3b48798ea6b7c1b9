//! Control-plane RPC transport.
//!
//! The upstream wire schema is an opaque collaborator (spec.md §1
//! Non-goals) — each RPC is modeled here as `action` + JSON `params`,
//! answered by a single reply envelope every operation in the core shares.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ab_domain::error::{Error, Result};

/// The envelope every upstream control-plane RPC replies with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcReply {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcReply {
    /// Convenience for dispatch sites that want `(code, message)` on failure.
    pub fn error_parts(&self) -> (String, String) {
        (
            self.code.clone().unwrap_or_else(|| "Unknown".into()),
            self.message.clone().unwrap_or_else(|| "no message".into()),
        )
    }
}

/// Abstraction over "issue an upstream control-plane RPC", so the dispatch
/// and session-registry code can be tested against a mock without a network.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, action: &str, params: Value) -> Result<RpcReply>;
}

/// Real RPC transport backed by `reqwest`, POSTing `{action, params}` as a
/// JSON body to the configured control-plane endpoint with bearer auth.
pub struct HttpRpcTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRpcTransport {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| Error::Transport(format!("failed to build RPC client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    async fn call_once(&self, action: &str, params: &Value) -> Result<RpcReply> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), action);

        tracing::debug!(action, url = %url, "issuing control-plane RPC");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({ "action": action, "params": params }))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("API request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("API request failed: {e}")))?;

        if !status.is_success() {
            return Err(Error::Transport(format!(
                "API request failed with status: {}",
                status.as_u16()
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::Transport(format!("malformed RPC reply: {e}")))
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn call(&self, action: &str, params: Value) -> Result<RpcReply> {
        self.call_once(action, &params).await
    }
}
