//! End-to-end scenarios exercising the session registry, context hydration,
//! and dispatch against a scripted transport — no real network involved.

use std::collections::HashMap;
use std::sync::Mutex;

use agentbay::{
    CreateSessionParams, RpcReply, RpcTransport, Session, SessionRegistry, Tool, ToolCatalog, VpcHttpTransport,
    VpcParams,
};
use ab_context::ContextSyncAttachment;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A transport whose replies are scripted per-action, consumed in order.
struct ScriptedRpc {
    replies: Mutex<HashMap<String, Vec<RpcReply>>>,
}

impl ScriptedRpc {
    fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
        }
    }

    fn push(&self, action: &str, reply: RpcReply) {
        self.replies
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .push(reply);
    }
}

#[async_trait]
impl RpcTransport for ScriptedRpc {
    async fn call(&self, action: &str, _params: Value) -> ab_domain::error::Result<RpcReply> {
        let mut guard = self.replies.lock().unwrap();
        let queue = guard.entry(action.to_string()).or_default();
        if queue.is_empty() {
            return Ok(RpcReply {
                success: true,
                data: Some(serde_json::json!({ "contextStatus": "[]" })),
                ..Default::default()
            });
        }
        Ok(queue.remove(0))
    }
}

fn registry(rpc: ScriptedRpc) -> SessionRegistry {
    SessionRegistry::new("api-key", Arc::new(rpc), Arc::new(VpcHttpTransport::new(5_000).unwrap()))
}

fn context_status(context_id: &str, task_type: &str, status: &str) -> String {
    serde_json::json!([{
        "type": "data",
        "data": [{ "contextId": context_id, "taskType": task_type, "status": status }]
    }])
    .to_string()
}

/// S1: create with no params yields a session; it appears in a subsequent
/// list; delete succeeds; the following list no longer observes it.
#[tokio::test]
async fn s1_create_list_delete_round_trip() {
    let rpc = ScriptedRpc::new();
    rpc.push(
        "CreateMcpSession",
        RpcReply {
            request_id: "r1".into(),
            success: true,
            data: Some(serde_json::json!({ "sessionId": "sess-1" })),
            ..Default::default()
        },
    );
    rpc.push(
        "ListSession",
        RpcReply {
            success: true,
            data: Some(serde_json::json!({ "sessionIds": ["sess-1"], "totalCount": 1 })),
            ..Default::default()
        },
    );
    rpc.push(
        "ReleaseMcpSession",
        RpcReply {
            success: true,
            ..Default::default()
        },
    );
    rpc.push(
        "ListSession",
        RpcReply {
            success: true,
            data: Some(serde_json::json!({ "sessionIds": [], "totalCount": 0 })),
            ..Default::default()
        },
    );

    let registry = registry(rpc);

    let created = registry.create(CreateSessionParams::default()).await.unwrap();
    assert!(created.success);
    let session = created.session.unwrap();
    assert!(!session.session_id().is_empty());

    let listed = registry.list_by_labels(None, None, None).await.unwrap();
    assert!(listed.session_ids.contains(&session.session_id().to_string()));

    let deleted = registry.delete(&session, false).await.unwrap();
    assert!(deleted.success);

    let listed_after = registry.list_by_labels(None, None, None).await.unwrap();
    assert!(!listed_after.session_ids.contains(&session.session_id().to_string()));
}

/// S2: hydration alternates Pending, Pending, Success across three polls;
/// create returns only after all attachments reach a terminal state.
#[tokio::test(start_paused = true)]
async fn s2_hydration_wait_resolves_after_alternating_polls() {
    let rpc = ScriptedRpc::new();
    rpc.push(
        "CreateMcpSession",
        RpcReply {
            success: true,
            data: Some(serde_json::json!({ "sessionId": "sess-2" })),
            ..Default::default()
        },
    );
    for status in ["Pending", "Pending", "Success"] {
        rpc.push(
            "GetContextInfo",
            RpcReply {
                success: true,
                data: Some(serde_json::json!({ "contextStatus": context_status("ctx-1", "upload", status) })),
                ..Default::default()
            },
        );
    }

    let registry = registry(rpc);
    let params = CreateSessionParams {
        context_syncs: vec![ContextSyncAttachment::new("ctx-1", "/mnt")],
        ..Default::default()
    };
    let start = tokio::time::Instant::now();
    let result = registry.create(params).await.unwrap();
    assert!(result.success);
    assert!(start.elapsed() >= std::time::Duration::from_secs(4));
}

/// S3: an attachment that reports Failed still lets create succeed; the
/// result carries no failure flag.
#[tokio::test(start_paused = true)]
async fn s3_hydration_failure_is_tolerated() {
    let rpc = ScriptedRpc::new();
    rpc.push(
        "CreateMcpSession",
        RpcReply {
            success: true,
            data: Some(serde_json::json!({ "sessionId": "sess-3" })),
            ..Default::default()
        },
    );
    rpc.push(
        "GetContextInfo",
        RpcReply {
            success: true,
            data: Some(serde_json::json!({ "contextStatus": context_status("ctx-1", "upload", "Failed") })),
            ..Default::default()
        },
    );

    let registry = registry(rpc);
    let params = CreateSessionParams {
        context_syncs: vec![ContextSyncAttachment::new("ctx-1", "/mnt")],
        ..Default::default()
    };
    let result = registry.create(params).await.unwrap();
    assert!(result.success);
    assert!(result.session.is_some());
}

/// S4: label filtering — B is the only session matching the full label set.
#[tokio::test]
async fn s4_list_by_labels_filters_to_matching_session() {
    let rpc = ScriptedRpc::new();
    rpc.push(
        "ListSession",
        RpcReply {
            success: true,
            data: Some(serde_json::json!({ "sessionIds": ["sess-b"], "totalCount": 1 })),
            ..Default::default()
        },
    );

    let registry = registry(rpc);
    let mut labels = HashMap::new();
    labels.insert("env".to_string(), "test".to_string());
    labels.insert("owner".to_string(), "x".to_string());

    let result = registry.list_by_labels(Some(labels), None, None).await.unwrap();
    assert_eq!(result.session_ids, vec!["sess-b".to_string()]);
}

/// S5: sync-on-delete drives the upload poll to completion before the
/// release RPC fires.
#[tokio::test(start_paused = true)]
async fn s5_sync_on_delete_completes_before_release() {
    let rpc = ScriptedRpc::new();
    rpc.push(
        "CreateMcpSession",
        RpcReply {
            success: true,
            data: Some(serde_json::json!({ "sessionId": "sess-5" })),
            ..Default::default()
        },
    );
    rpc.push(
        "SyncContext",
        RpcReply {
            success: true,
            ..Default::default()
        },
    );
    for status in ["InProgress", "InProgress", "Success"] {
        rpc.push(
            "GetContextInfo",
            RpcReply {
                success: true,
                data: Some(serde_json::json!({ "contextStatus": context_status("ctx-1", "upload", status) })),
                ..Default::default()
            },
        );
    }
    rpc.push(
        "ReleaseMcpSession",
        RpcReply {
            request_id: "release-1".into(),
            success: true,
            ..Default::default()
        },
    );

    let registry = registry(rpc);
    let created = registry.create(CreateSessionParams::default()).await.unwrap();
    let session = created.session.unwrap();

    let deleted = registry.delete(&session, true).await.unwrap();
    assert!(deleted.success);
    assert_eq!(deleted.request_id, "release-1");
}

/// S6: a VPC session with an empty tool catalog fails fast on dispatch
/// without making any HTTP call.
#[tokio::test]
async fn s6_vpc_dispatch_tool_not_found_skips_http_call() {
    let rpc: Arc<dyn RpcTransport> = Arc::new(ScriptedRpc::new());
    let session = Session::new(
        "sess-6",
        "api-key",
        "linux",
        "",
        Some(VpcParams {
            network_interface_ip: "10.0.0.1".into(),
            http_port: "8080".into(),
            token: "tok".into(),
        }),
        rpc,
        Arc::new(VpcHttpTransport::new(5_000).unwrap()),
        Arc::new(ToolCatalog::empty()),
    );

    let result = session.invoke("anyTool", &serde_json::json!({})).await;
    assert!(!result.success);
    assert_eq!(result.error_message, "server not found for tool: anyTool");
}

/// Dispatch through a populated catalog still routes correctly when VPC
/// parameters are present and valid (sanity check alongside S6).
#[tokio::test]
async fn vpc_dispatch_with_known_tool_fails_without_reachable_host() {
    let rpc: Arc<dyn RpcTransport> = Arc::new(ScriptedRpc::new());
    let catalog = Arc::new(ToolCatalog::empty());
    catalog.install(vec![Tool {
        name: "shell_exec".into(),
        description: String::new(),
        input_schema: serde_json::json!({}),
        server: "shell".into(),
        tool: "shell_exec".into(),
    }]);

    let session = Session::new(
        "sess-7",
        "api-key",
        "linux",
        "",
        Some(VpcParams {
            network_interface_ip: "127.0.0.1".into(),
            http_port: "1".into(),
            token: "tok".into(),
        }),
        rpc,
        Arc::new(VpcHttpTransport::new(200).unwrap()),
        catalog,
    );

    let result = session.invoke("shell_exec", &serde_json::json!({"cmd": "ls"})).await;
    assert!(!result.success);
    assert!(
        result.error_message.starts_with("VPC request failed: "),
        "unexpected error message: {}",
        result.error_message
    );
}
