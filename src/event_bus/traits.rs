use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// All events that flow through the fabric's event bus: tool-call lifecycle
/// events and OAuth refresh-monitor events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FabricEvent {
    /// Emitted by the executor before resolving/validating/executing a tool.
    ToolCallRequested {
        tool_name: String,
        task_id: Option<String>,
    },
    /// Emitted (by `emit_completion`, not `execute` itself) on success.
    ToolCallCompleted {
        tool_name: String,
        task_id: Option<String>,
        result: serde_json::Value,
    },
    /// Emitted (by `emit_completion`) on failure.
    ToolCallFailed {
        tool_name: String,
        task_id: Option<String>,
        error: String,
    },
    /// Within the 5-minute refresh threshold but no refresh token available.
    AuthExpiringSoon { server: String, message: String },
    /// `expiresAt` already in the past.
    AuthExpired { server: String, message: String },
    /// A proactive refresh succeeded.
    AuthRefreshed { server: String, message: String },
    /// A proactive refresh attempt failed.
    AuthRefreshFailed { server: String, message: String },
}

/// Central pub/sub bus for fabric events.
///
/// All returned `Receiver`s receive every published event; callers filter
/// client-side.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: FabricEvent) -> Result<(), String>;
    fn subscribe(&self) -> broadcast::Receiver<FabricEvent>;
}
