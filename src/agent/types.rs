//! Data model for the Main Agent Pump: session messages (`{role, content,
//! toolCalls?, toolCallId?}`) and the pump's `QueueItem` tagged union.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Session message. Invariant: every `role = Tool` message carries a
/// `tool_call_id` matching a prior assistant `tool_calls` entry — enforced
/// by construction in [`crate::agent::pump::AgentPump`] rather than at the
/// type level, since the session log itself is an external interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Where a reply or task-completion result should be routed. The pump owns
/// zero knowledge of channel transport beyond this identifier — delivery is
/// the reply callback's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub channel_type: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl ChannelRef {
    pub fn new(channel_type: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            channel_type: channel_type.into(),
            channel_id: channel_id.into(),
            reply_to: None,
        }
    }
}

/// An item on the pump's single-consumer FIFO queue.
#[derive(Debug, Clone)]
pub enum QueueItem {
    Message { text: String, channel: ChannelRef },
    TaskResult {
        task_id: String,
        success: bool,
        payload: String,
        channel: ChannelRef,
    },
    Think {
        channel: ChannelRef,
        /// `true` only for the `think` item directly cascaded from a
        /// `message` item: a failing `message` item synthesizes an apology
        /// reply, while `task_result` and `think` failures otherwise stay
        /// silent. Chained `think`s spawned by a prior `think`'s tool
        /// calls, and the `think` cascaded from a `task_result`, carry
        /// `false` so a second LLM-call failure in the same turn chain
        /// does not re-apologize.
        from_message: bool,
    },
}
