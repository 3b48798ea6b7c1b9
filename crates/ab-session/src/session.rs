//! A live session: identity, transport mode, tool catalog, and context
//! manager composed together (spec.md §3 "Session", §4.1).

use std::collections::HashMap;
use std::sync::Arc;

use ab_context::ContextManager;
use ab_dispatch::{Dispatcher, ToolCatalog, ToolResult, VpcParams};
use ab_domain::error::{Error, Result};
use ab_transport::RpcTransport;
use parking_lot::RwLock;
use serde_json::Value;

/// Smallest valid port for `getLink` (spec.md §4.1, §8 property 8).
const MIN_LINK_PORT: u16 = 30100;
/// Largest valid port for `getLink`.
const MAX_LINK_PORT: u16 = 30199;

pub struct Session {
    session_id: String,
    api_key: String,
    image_id: String,
    resource_url: RwLock<String>,
    vpc: Option<VpcParams>,
    rpc: Arc<dyn RpcTransport>,
    dispatcher: Arc<Dispatcher>,
    context: Arc<ContextManager>,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: impl Into<String>,
        api_key: impl Into<String>,
        image_id: impl Into<String>,
        resource_url: impl Into<String>,
        vpc: Option<VpcParams>,
        rpc: Arc<dyn RpcTransport>,
        vpc_transport: Arc<ab_transport::VpcHttpTransport>,
        catalog: Arc<ToolCatalog>,
    ) -> Self {
        let session_id = session_id.into();
        let api_key = api_key.into();
        let image_id = image_id.into();

        let dispatcher = Arc::new(Dispatcher::new(
            session_id.clone(),
            api_key.clone(),
            image_id.clone(),
            vpc.clone(),
            Arc::clone(&rpc),
            vpc_transport,
            catalog,
        ));
        let context = Arc::new(ContextManager::new(session_id.clone(), api_key.clone(), Arc::clone(&rpc)));

        Self {
            session_id,
            api_key,
            image_id,
            resource_url: RwLock::new(resource_url.into()),
            vpc,
            rpc,
            dispatcher,
            context,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    pub fn is_vpc(&self) -> bool {
        self.vpc.is_some()
    }

    pub fn resource_url(&self) -> String {
        self.resource_url.read().clone()
    }

    pub fn set_resource_url(&self, url: impl Into<String>) {
        *self.resource_url.write() = url.into();
    }

    pub fn tool_catalog(&self) -> &Arc<ToolCatalog> {
        self.dispatcher.catalog()
    }

    pub fn context(&self) -> &Arc<ContextManager> {
        &self.context
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub async fn invoke(&self, tool_name: &str, args: &Value) -> ToolResult {
        self.dispatcher.invoke(tool_name, args).await
    }

    pub async fn set_labels(&self, labels: &HashMap<String, String>) -> Result<()> {
        let labels_json = serde_json::to_string(labels)?;
        let params = serde_json::json!({
            "apiKey": self.api_key,
            "sessionId": self.session_id,
            "labels": labels_json,
        });
        let reply = self.rpc.call("SetLabel", params).await?;
        if !reply.success {
            let (code, message) = reply.error_parts();
            return Err(Error::Api {
                code: Some(code),
                message,
            });
        }
        Ok(())
    }

    pub async fn get_labels(&self) -> Result<HashMap<String, String>> {
        let params = serde_json::json!({ "apiKey": self.api_key, "sessionId": self.session_id });
        let reply = self.rpc.call("GetLabel", params).await?;
        if !reply.success {
            let (code, message) = reply.error_parts();
            return Err(Error::Api {
                code: Some(code),
                message,
            });
        }

        let raw = reply
            .data
            .as_ref()
            .and_then(|d| d.get("labels"))
            .and_then(|l| l.as_str())
            .unwrap_or("{}");

        serde_json::from_str(raw).map_err(Error::Json)
    }

    /// `getLink(port)` — `port` must fall in 30100..=30199 when supplied
    /// (spec.md §8 property 8).
    pub async fn get_link(&self, port: Option<u16>) -> Result<String> {
        if let Some(p) = port {
            if !(MIN_LINK_PORT..=MAX_LINK_PORT).contains(&p) {
                return Err(Error::Validation(format!(
                    "port {p} outside valid range {MIN_LINK_PORT}-{MAX_LINK_PORT}"
                )));
            }
        }

        let params = serde_json::json!({
            "apiKey": self.api_key,
            "sessionId": self.session_id,
            "port": port,
        });
        let reply = self.rpc.call("GetLink", params).await?;
        if !reply.success {
            let (code, message) = reply.error_parts();
            return Err(Error::Api {
                code: Some(code),
                message,
            });
        }

        let url = reply
            .data
            .as_ref()
            .and_then(|d| d.get("url"))
            .and_then(|u| u.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(url)
    }

    /// Releases this session's resources without touching any registry
    /// cache — [`crate::registry::SessionRegistry::delete`] is responsible
    /// for cache bookkeeping.
    pub async fn release(&self, sync_context: bool) -> Result<ReleaseOutcome> {
        if sync_context {
            let success = self
                .context
                .sync_with_completion(None, None, None, 150, std::time::Duration::from_millis(1500))
                .await;
            if !success {
                tracing::warn!(session_id = %self.session_id, "context sync before release did not complete cleanly");
            }
        }

        let params = serde_json::json!({ "apiKey": self.api_key, "sessionId": self.session_id });
        let reply = self.rpc.call("ReleaseMcpSession", params).await?;
        let request_id = reply.request_id.clone();

        if !reply.success {
            let (code, message) = reply.error_parts();
            return Ok(ReleaseOutcome {
                request_id,
                success: false,
                error_code: Some(code),
                error_message: Some(message),
            });
        }

        Ok(ReleaseOutcome {
            request_id,
            success: true,
            error_code: None,
            error_message: None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub request_id: String,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}
