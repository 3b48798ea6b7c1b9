//! Per-session facade over the context-info and context-sync RPCs, with
//! blocking and callback-driven completion polling (spec.md §4.2).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ab_domain::error::Result;
use ab_domain::trace::TraceEvent;
use ab_transport::RpcTransport;

use crate::model::{parse_context_status, ContextStatusData};

#[derive(Debug, Clone, Default)]
pub struct ContextInfoResult {
    pub request_id: String,
    pub success: bool,
    pub context_status_data: Vec<ContextStatusData>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ContextSyncResult {
    pub request_id: String,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Owns the polling lifecycle for one session's context syncs. Dropping or
/// cancelling the owning session should call [`ContextManager::cancel`] so
/// any in-flight background poll exits without firing its callback.
pub struct ContextManager {
    session_id: String,
    api_key: String,
    rpc: Arc<dyn RpcTransport>,
    cancelled: Arc<AtomicBool>,
}

impl ContextManager {
    pub fn new(session_id: impl Into<String>, api_key: impl Into<String>, rpc: Arc<dyn RpcTransport>) -> Self {
        Self {
            session_id: session_id.into(),
            api_key: api_key.into(),
            rpc,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Invalidates any outstanding background poll. Best-effort: an
    /// already-running iteration completes, then the task exits without
    /// invoking its callback.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub async fn info(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        task_type: Option<&str>,
    ) -> Result<ContextInfoResult> {
        let params = serde_json::json!({
            "apiKey": self.api_key,
            "sessionId": self.session_id,
            "contextId": context_id,
            "path": path,
            "taskType": task_type,
        });

        let reply = self.rpc.call("GetContextInfo", params).await?;
        let request_id = reply.request_id.clone();

        if !reply.success {
            let (code, message) = reply.error_parts();
            return Ok(ContextInfoResult {
                request_id,
                success: false,
                context_status_data: Vec::new(),
                error_message: Some(format!("[{code}] {message}")),
            });
        }

        let raw = reply
            .data
            .as_ref()
            .and_then(|d| d.get("contextStatus"))
            .and_then(|s| s.as_str())
            .unwrap_or("[]");

        Ok(ContextInfoResult {
            request_id,
            success: true,
            context_status_data: parse_context_status(raw),
            error_message: None,
        })
    }

    /// Triggers a sync task; returns immediately, it does not wait for the
    /// task to complete.
    pub async fn sync(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        mode: Option<&str>,
    ) -> Result<ContextSyncResult> {
        let mode = mode.unwrap_or("upload");
        TraceEvent::ContextSyncTriggered {
            session_id: self.session_id.clone(),
            context_id: context_id.map(str::to_string),
            mode: mode.to_string(),
        }
        .emit();
        let params = serde_json::json!({
            "apiKey": self.api_key,
            "sessionId": self.session_id,
            "contextId": context_id,
            "path": path,
            "mode": mode,
        });

        let reply = self.rpc.call("SyncContext", params).await?;
        let request_id = reply.request_id.clone();

        if !reply.success {
            let (code, message) = reply.error_parts();
            return Ok(ContextSyncResult {
                request_id,
                success: false,
                error_message: Some(format!("[{code}] {message}")),
            });
        }

        Ok(ContextSyncResult {
            request_id,
            success: true,
            error_message: None,
        })
    }

    /// Blocking variant: triggers `sync`, then polls until every upload or
    /// download task is terminal (or `max_retries` is exhausted), returning
    /// the final success boolean.
    pub async fn sync_with_completion(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        mode: Option<&str>,
        max_retries: usize,
        retry_interval: Duration,
    ) -> bool {
        match self.sync(context_id, path, mode).await {
            Ok(result) if result.success => {}
            _ => {
                TraceEvent::ContextSyncCompleted {
                    session_id: self.session_id.clone(),
                    success: false,
                    timed_out: false,
                }
                .emit();
                return false;
            }
        }

        let outcome = self
            .poll_until_complete(context_id, path, max_retries, retry_interval)
            .await;

        TraceEvent::ContextSyncCompleted {
            session_id: self.session_id.clone(),
            success: outcome.success,
            timed_out: outcome.timed_out,
        }
        .emit();

        outcome.success
    }

    /// Non-blocking variant: spawns a background task that calls
    /// `sync_with_completion` and invokes `callback(success)` exactly once,
    /// unless [`ContextManager::cancel`] fired first.
    pub fn sync_with_completion_callback<F>(
        self: &Arc<Self>,
        context_id: Option<String>,
        path: Option<String>,
        mode: Option<String>,
        max_retries: usize,
        retry_interval: Duration,
        callback: F,
    ) where
        F: FnOnce(bool) + Send + 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let success = this
                .sync_with_completion(
                    context_id.as_deref(),
                    path.as_deref(),
                    mode.as_deref(),
                    max_retries,
                    retry_interval,
                )
                .await;
            if !this.cancelled.load(Ordering::SeqCst) {
                callback(success);
            }
        });
    }

    async fn poll_until_complete(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        max_retries: usize,
        retry_interval: Duration,
    ) -> PollOutcome {
        for attempt in 1..=max_retries {
            if self.cancelled.load(Ordering::SeqCst) {
                return PollOutcome { success: false, timed_out: false };
            }

            if let Ok(result) = self.info(context_id, path, None).await {
                let relevant: Vec<&ContextStatusData> = result
                    .context_status_data
                    .iter()
                    .filter(|d| d.task_type == "upload" || d.task_type == "download")
                    .collect();

                if relevant.is_empty() || relevant.iter().all(|d| d.is_terminal()) {
                    return PollOutcome {
                        success: relevant.iter().all(|d| !d.is_failed()),
                        timed_out: false,
                    };
                }
            }

            if attempt < max_retries {
                tokio::time::sleep(retry_interval).await;
            }
        }

        tracing::warn!(session_id = %self.session_id, "context sync polling timed out");
        PollOutcome { success: false, timed_out: true }
    }
}

struct PollOutcome {
    success: bool,
    timed_out: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_transport::RpcReply;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    struct ScriptedRpc {
        sync_reply: Mutex<Option<RpcReply>>,
        info_replies: Mutex<Vec<RpcReply>>,
    }

    #[async_trait]
    impl RpcTransport for ScriptedRpc {
        async fn call(&self, action: &str, _params: Value) -> Result<RpcReply> {
            match action {
                "SyncContext" => Ok(self.sync_reply.lock().unwrap().take().unwrap()),
                "GetContextInfo" => {
                    let mut replies = self.info_replies.lock().unwrap();
                    if replies.is_empty() {
                        Ok(RpcReply {
                            success: true,
                            data: Some(serde_json::json!({ "contextStatus": "[]" })),
                            ..Default::default()
                        })
                    } else {
                        Ok(replies.remove(0))
                    }
                }
                other => panic!("unexpected action: {other}"),
            }
        }
    }

    fn info_reply(status: &str) -> RpcReply {
        let context_status = serde_json::json!([{
            "type": "data",
            "data": [{
                "contextId": "ctx-1",
                "path": "/mnt",
                "taskType": "upload",
                "status": status,
            }]
        }])
        .to_string();

        RpcReply {
            success: true,
            data: Some(serde_json::json!({ "contextStatus": context_status })),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sync_with_completion_succeeds_after_pending_then_success() {
        let rpc = Arc::new(ScriptedRpc {
            sync_reply: Mutex::new(Some(RpcReply {
                success: true,
                ..Default::default()
            })),
            info_replies: Mutex::new(vec![info_reply("Pending"), info_reply("Success")]),
        });
        let manager = ContextManager::new("session-1", "key", rpc);
        let success = manager
            .sync_with_completion(Some("ctx-1"), None, None, 5, Duration::from_millis(10))
            .await;
        assert!(success);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_with_completion_fails_when_status_is_failed() {
        let rpc = Arc::new(ScriptedRpc {
            sync_reply: Mutex::new(Some(RpcReply {
                success: true,
                ..Default::default()
            })),
            info_replies: Mutex::new(vec![info_reply("Failed")]),
        });
        let manager = ContextManager::new("session-1", "key", rpc);
        let success = manager
            .sync_with_completion(Some("ctx-1"), None, None, 5, Duration::from_millis(10))
            .await;
        assert!(!success);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_api_failure_short_circuits_before_polling() {
        let rpc = Arc::new(ScriptedRpc {
            sync_reply: Mutex::new(Some(RpcReply {
                success: false,
                code: Some("InvalidContext".into()),
                message: Some("no such context".into()),
                ..Default::default()
            })),
            info_replies: Mutex::new(Vec::new()),
        });
        let manager = ContextManager::new("session-1", "key", rpc);
        let success = manager
            .sync_with_completion(Some("ctx-1"), None, None, 5, Duration::from_millis(10))
            .await;
        assert!(!success);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_relevant_entries_counts_as_complete() {
        let rpc = Arc::new(ScriptedRpc {
            sync_reply: Mutex::new(Some(RpcReply {
                success: true,
                ..Default::default()
            })),
            info_replies: Mutex::new(vec![RpcReply {
                success: true,
                data: Some(serde_json::json!({ "contextStatus": "[]" })),
                ..Default::default()
            }]),
        });
        let manager = ContextManager::new("session-1", "key", rpc);
        let success = manager
            .sync_with_completion(Some("ctx-1"), None, None, 5, Duration::from_millis(10))
            .await;
        assert!(success);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_fires_once_with_final_result() {
        let rpc = Arc::new(ScriptedRpc {
            sync_reply: Mutex::new(Some(RpcReply {
                success: true,
                ..Default::default()
            })),
            info_replies: Mutex::new(vec![info_reply("Success")]),
        });
        let manager = Arc::new(ContextManager::new("session-1", "key", rpc));
        let (tx, rx) = tokio::sync::oneshot::channel();
        manager.sync_with_completion_callback(
            Some("ctx-1".into()),
            None,
            None,
            5,
            Duration::from_millis(10),
            move |success| {
                let _ = tx.send(success);
            },
        );
        let success = rx.await.unwrap();
        assert!(success);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_suppresses_callback() {
        let rpc = Arc::new(ScriptedRpc {
            sync_reply: Mutex::new(Some(RpcReply {
                success: true,
                ..Default::default()
            })),
            info_replies: Mutex::new(vec![info_reply("Pending"), info_reply("Success")]),
        });
        let manager = Arc::new(ContextManager::new("session-1", "key", rpc));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        manager.sync_with_completion_callback(
            Some("ctx-1".into()),
            None,
            None,
            5,
            Duration::from_millis(10),
            move |success| {
                let _ = tx.send(success);
            },
        );
        manager.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
