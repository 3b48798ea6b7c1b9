//! Session Registry (Client): creates sessions (with context hydration
//! wait), lists by labels, deletes (with optional sync), and caches
//! sessions locally (spec.md §4.1).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ab_context::ContextSyncAttachment;
use ab_dispatch::ToolCatalog;
use ab_domain::error::Result;
use ab_domain::trace::TraceEvent;
use ab_transport::{RpcTransport, VpcHttpTransport};
use parking_lot::RwLock;

use crate::session::Session;

/// Interval between hydration polls (spec.md §9 "choose one and document
/// it" — 2s matches the revision this implementation follows).
const HYDRATION_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Hydration poll budget: 150 attempts × 2s = 5 minutes.
const HYDRATION_MAX_ATTEMPTS: usize = 150;

#[derive(Default)]
pub struct CreateSessionParams {
    pub labels: Option<HashMap<String, String>>,
    pub image_id: Option<String>,
    pub context_syncs: Vec<ContextSyncAttachment>,
}

#[derive(Clone)]
pub struct SessionResult {
    pub request_id: String,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub session: Option<Arc<Session>>,
}

#[derive(Debug, Clone)]
pub struct SessionListResult {
    pub request_id: String,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub session_ids: Vec<String>,
    pub next_token: String,
    pub max_results: u32,
    pub total_count: u32,
}

#[derive(Debug, Clone)]
pub struct DeleteResult {
    pub request_id: String,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Entry point: the only component that owns the session cache and the
/// shared transport (spec.md §3 "Ownership").
pub struct SessionRegistry {
    api_key: String,
    rpc: Arc<dyn RpcTransport>,
    vpc_transport: Arc<VpcHttpTransport>,
    cache: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(api_key: impl Into<String>, rpc: Arc<dyn RpcTransport>, vpc_transport: Arc<VpcHttpTransport>) -> Self {
        Self {
            api_key: api_key.into(),
            rpc,
            vpc_transport,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, params: CreateSessionParams) -> Result<SessionResult> {
        let labels_json = match &params.labels {
            Some(labels) if !labels.is_empty() => Some(serde_json::to_string(labels)?),
            _ => None,
        };

        let mut context_sync_entries = Vec::with_capacity(params.context_syncs.len());
        for attachment in &params.context_syncs {
            context_sync_entries.push(attachment.to_rpc_entry()?);
        }

        let image_id = params.image_id.clone().unwrap_or_else(|| "linux".to_string());

        let rpc_params = serde_json::json!({
            "apiKey": self.api_key,
            "labels": labels_json,
            "imageId": image_id,
            "contextSyncs": context_sync_entries,
        });

        let reply = self.rpc.call("CreateMcpSession", rpc_params).await?;
        let request_id = reply.request_id.clone();

        if !reply.success {
            let (code, message) = reply.error_parts();
            return Ok(SessionResult {
                request_id,
                success: false,
                error_code: Some(code),
                error_message: Some(message),
                session: None,
            });
        }

        let Some(data) = &reply.data else {
            return Ok(SessionResult {
                request_id,
                success: false,
                error_code: Some("NoSessionId".into()),
                error_message: Some("reply carried no data".into()),
                session: None,
            });
        };

        let Some(session_id) = data.get("sessionId").and_then(|v| v.as_str()) else {
            return Ok(SessionResult {
                request_id,
                success: false,
                error_code: Some("NoSessionId".into()),
                error_message: Some("reply carried no session id".into()),
                session: None,
            });
        };

        let resource_url = data.get("resourceUrl").and_then(|v| v.as_str()).unwrap_or_default();
        let vpc = vpc_params_from_reply(data);

        let session = Arc::new(Session::new(
            session_id,
            self.api_key.clone(),
            image_id,
            resource_url,
            vpc,
            Arc::clone(&self.rpc),
            Arc::clone(&self.vpc_transport),
            Arc::new(ToolCatalog::empty()),
        ));

        self.cache.write().insert(session_id.to_string(), Arc::clone(&session));

        TraceEvent::SessionCreated {
            session_id: session.session_id().to_string(),
            vpc: session.is_vpc(),
            context_attachments: params.context_syncs.len(),
        }
        .emit();

        if !params.context_syncs.is_empty() {
            self.wait_for_hydration(&session).await;
        }

        Ok(SessionResult {
            request_id,
            success: true,
            error_code: None,
            error_message: None,
            session: Some(session),
        })
    }

    async fn wait_for_hydration(&self, session: &Arc<Session>) {
        for attempt in 1..=HYDRATION_MAX_ATTEMPTS {
            match session.context().info(None, None, None).await {
                Ok(info) if info.success => {
                    let total_count = info.context_status_data.len();
                    let terminal_count = info.context_status_data.iter().filter(|d| d.is_terminal()).count();

                    TraceEvent::HydrationPolling {
                        session_id: session.session_id().to_string(),
                        attempt: attempt as u32,
                        terminal_count,
                        total_count,
                    }
                    .emit();

                    if terminal_count == total_count {
                        let failures = info.context_status_data.iter().filter(|d| d.is_failed()).count();
                        if failures > 0 {
                            tracing::warn!(
                                session_id = %session.session_id(),
                                failures,
                                "context hydration completed with per-attachment failures"
                            );
                        }
                        TraceEvent::HydrationCompleted {
                            session_id: session.session_id().to_string(),
                            attempts: attempt as u32,
                            timed_out: false,
                            any_failed: failures > 0,
                        }
                        .emit();
                        return;
                    }
                }
                Ok(_) | Err(_) => {
                    // Transport errors and API-level failures during polling
                    // are swallowed and retried (spec.md §4.1).
                }
            }

            if attempt < HYDRATION_MAX_ATTEMPTS {
                tokio::time::sleep(HYDRATION_POLL_INTERVAL).await;
            }
        }

        tracing::warn!(
            session_id = %session.session_id(),
            "context hydration did not complete within the polling budget; returning session anyway"
        );
        TraceEvent::HydrationCompleted {
            session_id: session.session_id().to_string(),
            attempts: HYDRATION_MAX_ATTEMPTS as u32,
            timed_out: true,
            any_failed: false,
        }
        .emit();
    }

    pub async fn list_by_labels(
        &self,
        labels: Option<HashMap<String, String>>,
        max_results: Option<u32>,
        next_token: Option<String>,
    ) -> Result<SessionListResult> {
        let labels_json = labels
            .as_ref()
            .filter(|l| !l.is_empty())
            .map(serde_json::to_string)
            .transpose()?;
        let max_results = max_results.unwrap_or(10);
        let next_token = next_token.unwrap_or_default();

        let params = serde_json::json!({
            "apiKey": self.api_key,
            "labels": labels_json,
            "maxResults": max_results,
            "nextToken": next_token,
        });

        let reply = self.rpc.call("ListSession", params).await?;
        let request_id = reply.request_id.clone();

        if !reply.success {
            let (code, message) = reply.error_parts();
            return Ok(SessionListResult {
                request_id,
                success: false,
                error_code: Some(code),
                error_message: Some(message),
                session_ids: Vec::new(),
                next_token: String::new(),
                max_results,
                total_count: 0,
            });
        }

        let data = reply.data.as_ref();
        let session_ids: Vec<String> = data
            .and_then(|d| d.get("sessionIds"))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let returned_next_token = data
            .and_then(|d| d.get("nextToken"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let total_count = data.and_then(|d| d.get("totalCount")).and_then(|v| v.as_u64()).unwrap_or(0) as u32;

        self.cache_stubs(&session_ids);

        Ok(SessionListResult {
            request_id,
            success: true,
            error_code: None,
            error_message: None,
            session_ids,
            next_token: returned_next_token,
            max_results,
            total_count,
        })
    }

    /// Constructs stub [`Session`] objects for ids not already cached, so a
    /// subsequent [`SessionRegistry::get_cached`] can resolve them without a
    /// further RPC.
    fn cache_stubs(&self, session_ids: &[String]) {
        let mut cache = self.cache.write();
        for id in session_ids {
            cache.entry(id.clone()).or_insert_with(|| {
                Arc::new(Session::new(
                    id.clone(),
                    self.api_key.clone(),
                    "linux",
                    "",
                    None,
                    Arc::clone(&self.rpc),
                    Arc::clone(&self.vpc_transport),
                    Arc::new(ToolCatalog::empty()),
                ))
            });
        }
    }

    pub async fn delete(&self, session: &Arc<Session>, sync_context: bool) -> Result<DeleteResult> {
        let outcome = session.release(sync_context).await?;

        if !outcome.success {
            return Ok(DeleteResult {
                request_id: outcome.request_id,
                success: false,
                error_code: outcome.error_code,
                error_message: outcome.error_message,
            });
        }

        self.cache.write().remove(session.session_id());

        TraceEvent::SessionDeleted {
            session_id: session.session_id().to_string(),
            synced_context: sync_context,
        }
        .emit();

        Ok(DeleteResult {
            request_id: outcome.request_id,
            success: true,
            error_code: None,
            error_message: None,
        })
    }

    pub fn get_cached(&self, session_id: &str) -> Option<Arc<Session>> {
        self.cache.read().get(session_id).cloned()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}

fn vpc_params_from_reply(data: &serde_json::Value) -> Option<ab_dispatch::VpcParams> {
    let ip = data.get("networkInterfaceIp").and_then(|v| v.as_str()).unwrap_or_default();
    let port = data.get("httpPort").and_then(|v| v.as_str()).unwrap_or_default();
    let token = data.get("token").and_then(|v| v.as_str()).unwrap_or_default();

    if ip.is_empty() || port.is_empty() || token.is_empty() {
        return None;
    }

    Some(ab_dispatch::VpcParams {
        network_interface_ip: ip.to_string(),
        http_port: port.to_string(),
        token: token.to_string(),
    })
}
