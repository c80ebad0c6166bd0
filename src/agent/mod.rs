//! Main Agent Pump and its supporting types.

mod llm;
mod pump;
mod session;
pub mod types;

pub use llm::{LlmProvider, LlmTurn};
pub use pump::{AgentPump, PumpSettings, ReplyCallback, ReplyPayload, TaskSpawner};
pub use session::{AppendMetadata, InMemorySessionStore, SessionStore};
pub use types::{ChannelRef, Message, QueueItem, Role, ToolCall};
