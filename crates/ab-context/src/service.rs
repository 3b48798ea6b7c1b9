//! Process-wide CRUD over named persistent contexts (spec.md §4.5). Holds no
//! cache; every call is a direct RPC round trip.

use std::sync::Arc;

use ab_domain::error::{Error, Result};
use ab_transport::RpcTransport;

use crate::model::Context;

/// A weak back-reference to the client's transport and credential — never
/// outlives the client, never owns it (spec.md §3 "Ownership").
pub struct ContextService {
    api_key: String,
    rpc: Arc<dyn RpcTransport>,
}

impl ContextService {
    pub fn new(api_key: impl Into<String>, rpc: Arc<dyn RpcTransport>) -> Self {
        Self {
            api_key: api_key.into(),
            rpc,
        }
    }

    pub async fn list(&self) -> Result<Vec<Context>> {
        let params = serde_json::json!({ "apiKey": self.api_key });
        let reply = self.rpc.call("ListContexts", params).await?;

        if !reply.success {
            let (code, message) = reply.error_parts();
            return Err(Error::Api { code: Some(code), message });
        }

        let contexts = reply
            .data
            .as_ref()
            .and_then(|d| d.get("contexts"))
            .cloned()
            .map(serde_json::from_value::<Vec<Context>>)
            .transpose()
            .map_err(|e| Error::Transport(format!("malformed context list: {e}")))?
            .unwrap_or_default();

        Ok(contexts)
    }

    /// `allow_create = true` causes the server to create the context if it
    /// does not already exist. Returns `None` when the reply carries no
    /// context data.
    pub async fn get(&self, name: &str, allow_create: bool) -> Result<Option<Context>> {
        let params = serde_json::json!({
            "apiKey": self.api_key,
            "name": name,
            "allowCreate": allow_create,
        });
        let reply = self.rpc.call("GetContext", params).await?;

        if !reply.success {
            let (code, message) = reply.error_parts();
            return Err(Error::Api { code: Some(code), message });
        }

        let context = reply
            .data
            .as_ref()
            .and_then(|d| d.get("context"))
            .filter(|c| !c.is_null())
            .cloned()
            .map(serde_json::from_value::<Context>)
            .transpose()
            .map_err(|e| Error::Transport(format!("malformed context: {e}")))?;

        Ok(context)
    }

    pub async fn create(&self, name: &str) -> Result<Context> {
        self.get(name, true)
            .await?
            .ok_or_else(|| Error::Transport(format!("context not returned after create: {name}")))
    }

    pub async fn update(&self, context: &Context) -> Result<()> {
        let params = serde_json::json!({ "apiKey": self.api_key, "context": context });
        let reply = self.rpc.call("ModifyContext", params).await?;

        if !reply.success {
            let (code, message) = reply.error_parts();
            return Err(Error::Api { code: Some(code), message });
        }

        Ok(())
    }

    pub async fn delete(&self, context: &Context) -> Result<()> {
        let params = serde_json::json!({ "apiKey": self.api_key, "contextId": context.id });
        let reply = self.rpc.call("DeleteContext", params).await?;

        if !reply.success {
            let (code, message) = reply.error_parts();
            return Err(Error::Api { code: Some(code), message });
        }

        Ok(())
    }
}
