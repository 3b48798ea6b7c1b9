//! Transport layer: control-plane RPC (non-VPC tool calls, session
//! lifecycle, context CRUD) and data-plane HTTP (VPC tool calls).

pub mod rpc;
pub mod vpc;

pub use rpc::{HttpRpcTransport, RpcReply, RpcTransport};
pub use vpc::{vpc_request_id, VpcHttpTransport};
