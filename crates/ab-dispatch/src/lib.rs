//! Tool catalog and dispatch core: the uniform `invoke(tool, args)` surface
//! every generated tool wrapper calls (spec.md §4.3, §4.4).

pub mod catalog;
pub mod dispatch;

pub use catalog::{Tool, ToolCatalog};
pub use dispatch::{Dispatcher, McpToolsResult, ToolResult, VpcParams};
