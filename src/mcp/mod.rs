pub mod auth;
mod client;

pub use client::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpTool, McpToolProxy, McpTransport, wrap_server_tools, wrapped_name};
