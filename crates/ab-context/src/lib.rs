//! Context persistence coordination: attaching persistent storage contexts
//! to a session, waiting on hydration, and driving upload/download sync
//! (spec.md §4.2, §4.5).

pub mod manager;
pub mod model;
pub mod service;

pub use manager::{ContextInfoResult, ContextManager, ContextSyncResult};
pub use model::{parse_context_status, Context, ContextStatusData, ContextSyncAttachment};
pub use service::ContextService;
