//! Per-session tool catalog: name → (server, description, input schema).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single catalog entry describing one remote tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_schema", rename = "inputSchema")]
    pub input_schema: Value,
    pub server: String,
    /// Tool identifier; may equal `name`.
    #[serde(default)]
    pub tool: String,
}

fn default_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// The ordered, possibly-empty sequence of tools available to a session.
/// Immutable once loaded; refetched only by explicit request
/// ([`crate::dispatch::Dispatcher::list_mcp_tools`]).
#[derive(Default)]
pub struct ToolCatalog {
    tools: RwLock<Vec<Tool>>,
}

impl ToolCatalog {
    pub fn empty() -> Self {
        Self {
            tools: RwLock::new(Vec::new()),
        }
    }

    /// Replace the catalog contents wholesale (used after `listMcpTools`).
    pub fn install(&self, tools: Vec<Tool>) {
        *self.tools.write() = tools;
    }

    /// Linear name match — the catalog is small and queried rarely enough
    /// that an index is not worth the complexity (spec.md §4.4).
    pub fn find_server_for_tool(&self, tool_name: &str) -> Option<String> {
        self.tools
            .read()
            .iter()
            .find(|t| t.name == tool_name)
            .map(|t| t.server.clone())
    }

    pub fn all(&self) -> Vec<Tool> {
        self.tools.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }
}
