//! Dispatch Core: the single `invoke(tool, args)` entry point every tool
//! wrapper calls, routing between the control-plane RPC transport
//! (non-VPC) and the data-plane HTTP transport (VPC).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use ab_domain::error::Result;
use ab_domain::trace::TraceEvent;
use ab_transport::{vpc_request_id, RpcTransport, VpcHttpTransport};

use crate::catalog::{Tool, ToolCatalog};

/// VPC connection parameters for a session using the data-plane transport.
#[derive(Debug, Clone)]
pub struct VpcParams {
    pub network_interface_ip: String,
    pub http_port: String,
    pub token: String,
}

impl VpcParams {
    fn is_complete(&self) -> bool {
        !self.network_interface_ip.is_empty() && !self.http_port.is_empty()
    }
}

/// The result of a single tool invocation (spec.md §4.3).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: String,
    pub error_message: String,
    pub request_id: String,
}

impl ToolResult {
    fn ok(data: String, request_id: String) -> Self {
        Self {
            success: true,
            data,
            error_message: String::new(),
            request_id,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: String::new(),
            error_message: message.into(),
            request_id: String::new(),
        }
    }

    fn err_with_request_id(message: impl Into<String>, request_id: String) -> Self {
        Self {
            success: false,
            data: String::new(),
            error_message: message.into(),
            request_id,
        }
    }
}

/// Result of a `listMcpTools` call (shares the envelope shape every core
/// operation returns, spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct McpToolsResult {
    pub request_id: String,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub tools: Vec<Tool>,
}

/// Per-session dispatch core.
pub struct Dispatcher {
    session_id: String,
    api_key: String,
    image_id: String,
    vpc: Option<VpcParams>,
    rpc: Arc<dyn RpcTransport>,
    vpc_transport: Arc<VpcHttpTransport>,
    catalog: Arc<ToolCatalog>,
}

impl Dispatcher {
    pub fn new(
        session_id: impl Into<String>,
        api_key: impl Into<String>,
        image_id: impl Into<String>,
        vpc: Option<VpcParams>,
        rpc: Arc<dyn RpcTransport>,
        vpc_transport: Arc<VpcHttpTransport>,
        catalog: Arc<ToolCatalog>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            api_key: api_key.into(),
            image_id: image_id.into(),
            vpc,
            rpc,
            vpc_transport,
            catalog,
        }
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    /// The uniform entry point every tool wrapper calls.
    pub async fn invoke(&self, tool_name: &str, args: &Value) -> ToolResult {
        let args_json = match serde_json::to_string(args) {
            Ok(s) => s,
            Err(e) => return ToolResult::err(format!("failed to serialize arguments: {e}")),
        };

        let (transport, result) = match &self.vpc {
            Some(vpc) => ("vpc", self.invoke_vpc(tool_name, &args_json, vpc).await),
            None => ("rpc", self.invoke_rpc(tool_name, &args_json).await),
        };

        TraceEvent::ToolInvoked {
            session_id: self.session_id.clone(),
            tool_name: tool_name.to_string(),
            transport,
            success: result.success,
        }
        .emit();

        result
    }

    async fn invoke_rpc(&self, tool_name: &str, args_json: &str) -> ToolResult {
        let params = serde_json::json!({
            "apiKey": self.api_key,
            "sessionId": self.session_id,
            "name": tool_name,
            "args": args_json,
            "externalUserId": "",
            "imageId": "",
        });

        let reply = match self.rpc.call("CallMcpTool", params).await {
            Ok(r) => r,
            Err(e) => return ToolResult::err(e.to_string()),
        };

        let request_id = reply.request_id.clone();

        if !reply.success {
            let (code, message) = reply.error_parts();
            return ToolResult::err_with_request_id(format!("[{code}] {message}"), request_id);
        }

        let Some(data) = reply.data else {
            return ToolResult::err_with_request_id(
                "malformed response: missing data",
                request_id,
            );
        };

        if data.get("isError").and_then(|v| v.as_bool()).unwrap_or(false) {
            let error_text = data
                .get("content")
                .and_then(|c| c.as_array())
                .and_then(|arr| arr.first())
                .and_then(|first| first.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or("tool call failed")
                .to_string();
            return ToolResult::err_with_request_id(error_text, request_id);
        }

        ToolResult::ok(extract_text(&data), request_id)
    }

    async fn invoke_vpc(&self, tool_name: &str, args_json: &str, vpc: &VpcParams) -> ToolResult {
        let Some(server) = self.catalog.find_server_for_tool(tool_name) else {
            return ToolResult::err(format!("server not found for tool: {tool_name}"));
        };

        if !vpc.is_complete() {
            return ToolResult::err("VPC network configuration incomplete");
        }

        let request_id = vpc_request_id(epoch_millis(), rand::random());

        let body = match self
            .vpc_transport
            .call_tool(
                &vpc.network_interface_ip,
                &vpc.http_port,
                &server,
                tool_name,
                args_json,
                &vpc.token,
                &request_id,
            )
            .await
        {
            Ok(body) => body,
            Err(e) => return ToolResult::err(e.to_string()),
        };

        ToolResult::ok(extract_text(&body), String::new())
    }

    /// Discover the session's tools and install them into the catalog
    /// (spec.md §4.4).
    pub async fn list_mcp_tools(&self) -> Result<McpToolsResult> {
        let image_id = if self.image_id.is_empty() {
            "linux"
        } else {
            &self.image_id
        };
        let params = serde_json::json!({ "apiKey": self.api_key, "imageId": image_id });

        let reply = self.rpc.call("ListMcpTools", params).await?;
        let request_id = reply.request_id.clone();

        if !reply.success {
            let (code, message) = reply.error_parts();
            return Ok(McpToolsResult {
                request_id,
                success: false,
                error_code: Some(code),
                error_message: Some(message),
                tools: Vec::new(),
            });
        }

        let raw = reply
            .data
            .as_ref()
            .and_then(|v| v.as_str())
            .unwrap_or("[]");

        let tools: Vec<Tool> = serde_json::from_str(raw).unwrap_or_default();
        self.catalog.install(tools.clone());

        Ok(McpToolsResult {
            request_id,
            success: true,
            error_code: None,
            error_message: None,
            tools,
        })
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Shared text extraction (spec.md §4.3):
/// 1. `data.content[0].text` if `content` is a non-empty array.
/// 2. Else `data.result.content[0].text`.
/// 3. Else the JSON re-encoding of `data`.
pub fn extract_text(data: &Value) -> String {
    if let Some(text) = first_content_text(data.get("content")) {
        return text;
    }
    if let Some(text) = first_content_text(data.get("result").and_then(|r| r.get("content"))) {
        return text;
    }
    serde_json::to_string(data).unwrap_or_default()
}

fn first_content_text(content: Option<&Value>) -> Option<String> {
    content?
        .as_array()
        .filter(|arr| !arr.is_empty())
        .and_then(|arr| arr.first())
        .and_then(|first| first.get("text"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
}
