//! Context value types: the persistent storage volumes that can be mounted
//! into a session, and the per-task status records that track their sync.

use serde::{Deserialize, Serialize};

use ab_policy::SyncPolicy;

/// A named persistent storage volume at the service (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_used_at: String,
    #[serde(default)]
    pub os_type: String,
}

/// A (context, mount path, policy) triple supplied at session creation.
/// Multiple attachments per session are permitted; paths must be distinct.
#[derive(Debug, Clone)]
pub struct ContextSyncAttachment {
    pub context_id: String,
    pub path: String,
    pub policy: Option<SyncPolicy>,
}

impl ContextSyncAttachment {
    pub fn new(context_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            path: path.into(),
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// The `(contextId, path, policyJson)` entry carried in the creation RPC
    /// (spec.md §4.1).
    pub fn to_rpc_entry(&self) -> serde_json::Result<serde_json::Value> {
        let policy_json = match &self.policy {
            Some(p) => p.to_json_string()?,
            None => SyncPolicy::default().to_json_string()?,
        };
        Ok(serde_json::json!({
            "contextId": self.context_id,
            "path": self.path,
            "policy": policy_json,
        }))
    }
}

/// Per-attachment, per-task sync status (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextStatusData {
    pub context_id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub task_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub finish_time: Option<i64>,
}

impl ContextStatusData {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "Success" | "Failed")
    }

    pub fn is_failed(&self) -> bool {
        self.status == "Failed"
    }
}

/// Decode the doubly-encoded `contextStatus` field from a context-info reply
/// (spec.md §4.2): the outer value is a JSON array of `{type, data}` items;
/// for each item with `type == "data"`, `data` is itself a JSON array of
/// [`ContextStatusData`] records. Non-`"data"` items are skipped. Malformed
/// outer or inner JSON yields an empty list without panicking (spec.md §8
/// property 4).
pub fn parse_context_status(raw: &str) -> Vec<ContextStatusData> {
    let Ok(outer) = serde_json::from_str::<Vec<serde_json::Value>>(raw) else {
        return Vec::new();
    };

    let mut flattened = Vec::new();
    for item in outer {
        let Some(item_type) = item.get("type").and_then(|t| t.as_str()) else {
            continue;
        };
        if item_type != "data" {
            continue;
        }
        let Some(inner) = item.get("data") else {
            continue;
        };
        let Ok(records) = serde_json::from_value::<Vec<ContextStatusData>>(inner.clone()) else {
            continue;
        };
        flattened.extend(records);
    }
    flattened
}
