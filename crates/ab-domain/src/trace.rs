use serde::Serialize;

/// Structured trace events emitted across the AgentBay SDK crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        vpc: bool,
        context_attachments: usize,
    },
    SessionDeleted {
        session_id: String,
        synced_context: bool,
    },
    HydrationPolling {
        session_id: String,
        attempt: u32,
        terminal_count: usize,
        total_count: usize,
    },
    HydrationCompleted {
        session_id: String,
        attempts: u32,
        timed_out: bool,
        any_failed: bool,
    },
    ContextSyncTriggered {
        session_id: String,
        context_id: Option<String>,
        mode: String,
    },
    ContextSyncCompleted {
        session_id: String,
        success: bool,
        timed_out: bool,
    },
    ToolInvoked {
        session_id: String,
        tool_name: String,
        transport: &'static str,
        success: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "agentbay_event");
    }
}
