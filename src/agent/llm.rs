//! LLM turn interface for the Main Agent Pump.
//!
//! A settled result (text + optional tool calls) contract — no streaming at
//! the core layer, and no provider-routing concerns (model selection, cost
//! tiers), since those belong to an external provider-SDK layer.

use async_trait::async_trait;

use crate::agent::types::{Message, ToolCall};
use crate::tools::ToolInfo;

/// The settled result of one LLM turn: tool descriptors go in, either an
/// intercepted intent tool call or a generically-executed one comes out.
#[derive(Debug, Clone, Default)]
pub struct LlmTurn {
    /// Plain text accompanying the turn. When `tool_calls` is empty this is
    /// inner monologue; when tool calls are present it is appended
    /// alongside them.
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// A provider of settled LLM completions, driven by the pump's `think` step.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// `system_prompt` carries persona + channel-style guide + the inner
    /// monologue contract — it is never stored as a session `Message`,
    /// since `Message.role` has no `system` variant.
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolInfo],
    ) -> Result<LlmTurn, String>;
}
