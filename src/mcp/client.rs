//! MCP tool wrapping: adapts a remote MCP server's tool descriptors into
//! [`Tool`] registry entries, namespaced `<serverName>__<remoteName>`.
//!
//! The full wire protocol (process handshake, `initialize`/
//! `notifications/initialized` framing) is out of scope; only the
//! request/response shapes needed to wrap a remote tool as a local one are
//! kept, behind a [`McpTransport`] trait so this module never depends on a
//! concrete process/HTTP transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;
use crate::tools::{ParamSchema, Tool, ToolCategory, ToolContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// A remote tool descriptor as advertised by an MCP server's `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

/// The transport an MCP server is reached through. Kept intentionally thin —
/// framing and handshake live entirely behind the implementation.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<McpTool>, String>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, String>;
}

pub fn wrapped_name(server_name: &str, remote_name: &str) -> String {
    format!("{server_name}__{remote_name}")
}

/// Wraps one remote tool as a local [`Tool`], routing `execute` through the
/// server's [`McpTransport`].
pub struct McpToolProxy {
    name: String,
    remote_name: String,
    description: String,
    input_schema: Value,
    transport: Arc<dyn McpTransport>,
}

impl McpToolProxy {
    pub fn new(server_name: &str, remote: McpTool, transport: Arc<dyn McpTransport>) -> Self {
        Self {
            name: wrapped_name(server_name, &remote.name),
            remote_name: remote.name,
            description: remote.description,
            input_schema: remote.input_schema,
            transport,
        }
    }
}

#[async_trait]
impl Tool for McpToolProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Mcp
    }

    fn parameter_schema(&self) -> ParamSchema {
        // Remote tools validate on the server side; the registry-level
        // validation pass is intentionally permissive here.
        ParamSchema::new()
    }

    fn explicit_json_schema(&self) -> Option<Value> {
        Some(self.input_schema.clone())
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        self.transport
            .call_tool(&self.remote_name, args)
            .await
            .map_err(ToolError::Unknown)
    }
}

/// Wrap every tool a server advertises into registry-ready [`Tool`]s.
pub async fn wrap_server_tools(
    server_name: &str,
    transport: Arc<dyn McpTransport>,
) -> Result<Vec<Arc<dyn Tool>>, String> {
    let remote_tools = transport.list_tools().await?;
    Ok(remote_tools
        .into_iter()
        .map(|remote| Arc::new(McpToolProxy::new(server_name, remote, transport.clone())) as Arc<dyn Tool>)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeTransport {
        tools: Vec<McpTool>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl McpTransport for FakeTransport {
        async fn list_tools(&self) -> Result<Vec<McpTool>, String> {
            Ok(self.tools.clone())
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, String> {
            self.calls.lock().unwrap().push((name.to_string(), arguments.clone()));
            Ok(json!({"echoed": arguments}))
        }
    }

    #[test]
    fn wrapped_name_uses_double_underscore_convention() {
        assert_eq!(wrapped_name("weather", "forecast"), "weather__forecast");
    }

    #[tokio::test]
    async fn wrap_server_tools_namespaces_every_remote_tool() {
        let transport = Arc::new(FakeTransport {
            tools: vec![
                McpTool {
                    name: "forecast".to_string(),
                    description: "get a forecast".to_string(),
                    input_schema: json!({"type": "object"}),
                },
                McpTool {
                    name: "alerts".to_string(),
                    description: "get alerts".to_string(),
                    input_schema: json!({"type": "object"}),
                },
            ],
            calls: Mutex::new(Vec::new()),
        });

        let tools = wrap_server_tools("weather", transport).await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["weather__forecast".to_string(), "weather__alerts".to_string()]);
    }

    #[tokio::test]
    async fn proxy_execute_routes_through_transport_with_remote_name() {
        let transport = Arc::new(FakeTransport {
            tools: vec![McpTool {
                name: "forecast".to_string(),
                description: "get a forecast".to_string(),
                input_schema: json!({}),
            }],
            calls: Mutex::new(Vec::new()),
        });

        let tools = wrap_server_tools("weather", transport.clone()).await.unwrap();
        let proxy = &tools[0];
        let ctx = ToolContext::new("t1");
        let result = proxy.execute(json!({"city": "nyc"}), &ctx).await.unwrap();
        assert_eq!(result["echoed"]["city"], "nyc");

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].0, "forecast");
    }

    #[tokio::test]
    async fn proxy_exposes_explicit_schema_verbatim() {
        let transport = Arc::new(FakeTransport {
            tools: vec![McpTool {
                name: "forecast".to_string(),
                description: "get a forecast".to_string(),
                input_schema: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
            }],
            calls: Mutex::new(Vec::new()),
        });

        let tools = wrap_server_tools("weather", transport).await.unwrap();
        let schema = tools[0].explicit_json_schema().unwrap();
        assert_eq!(schema["properties"]["city"]["type"], "string");
    }
}
