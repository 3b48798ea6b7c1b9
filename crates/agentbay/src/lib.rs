//! AgentBay client SDK: provision sessions in a cloud agent sandbox, attach
//! persistent storage contexts, and dispatch tool calls over whichever
//! transport the session negotiated at creation.

use std::sync::Arc;

use ab_domain::config::{resolve_api_key, AgentBayConfig, ConfigOverrides};
pub use ab_domain::error::{Error, Result};
pub use ab_domain::trace::TraceEvent;

pub use ab_context::{
    Context, ContextInfoResult, ContextManager, ContextStatusData, ContextSyncAttachment, ContextSyncResult,
    ContextService,
};
pub use ab_dispatch::{Dispatcher, McpToolsResult, Tool, ToolCatalog, ToolResult, VpcParams};
pub use ab_policy::{
    BwList, DeletePolicy, DownloadPolicy, DownloadStrategy, SyncPolicy, UploadPolicy, UploadStrategy, WhiteList,
};
pub use ab_session::{CreateSessionParams, DeleteResult, Session, SessionListResult, SessionRegistry, SessionResult};
pub use ab_transport::{HttpRpcTransport, RpcReply, RpcTransport, VpcHttpTransport};

/// Entry point: owns the shared transport, the session registry cache, and
/// the process-wide context service (spec.md §3 "Ownership").
pub struct AgentBay {
    config: AgentBayConfig,
    sessions: SessionRegistry,
    contexts: ContextService,
}

impl AgentBay {
    /// Construct a client. `api_key` takes precedence over
    /// `AGENTBAY_API_KEY`; absence of both is a fatal `ConfigError`.
    pub fn new(api_key: Option<String>, overrides: ConfigOverrides) -> Result<Self> {
        let api_key = resolve_api_key(api_key)?;
        let config = AgentBayConfig::resolve(overrides);

        let rpc: Arc<dyn RpcTransport> = Arc::new(HttpRpcTransport::new(
            format!("https://{}", config.endpoint),
            api_key.clone(),
            config.timeout_ms,
        )?);
        let vpc_transport = Arc::new(VpcHttpTransport::new(config.timeout_ms)?);

        let sessions = SessionRegistry::new(api_key.clone(), Arc::clone(&rpc), vpc_transport);
        let contexts = ContextService::new(api_key, rpc);

        Ok(Self {
            config,
            sessions,
            contexts,
        })
    }

    pub fn config(&self) -> &AgentBayConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn contexts(&self) -> &ContextService {
        &self.contexts
    }
}

/// Installs a `tracing` subscriber honoring `AGENTBAY_LOG_LEVEL`
/// (spec.md §6). Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = std::env::var("AGENTBAY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}
