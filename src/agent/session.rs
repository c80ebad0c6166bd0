//! Session Store: the append-only message log the pump reads from and
//! appends to. The on-disk format is out of scope here — only
//! append-ordering and the channel-lookup the pump needs are part of the
//! core contract.
//!
//! Keeps an append-only log over a single running conversation and threads
//! channel identity through per-entry metadata rather than a compound
//! routing key, since the pump only ever has one conversation in flight.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::agent::types::{ChannelRef, Message};

/// Metadata attached to one append, kept alongside the `Message` but not
/// part of it — `Message` itself has no channel/metadata fields.
#[derive(Debug, Clone, Default)]
pub struct AppendMetadata {
    pub channel: Option<ChannelRef>,
    pub extra: Option<Value>,
}

impl AppendMetadata {
    pub fn with_channel(channel: ChannelRef) -> Self {
        Self {
            channel: Some(channel),
            extra: None,
        }
    }
}

/// External interface the pump appends to and reads from. The on-disk
/// format beyond append semantics is out of scope; this trait is the seam.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn append(&self, message: Message, metadata: AppendMetadata);
    /// Full history in append order, for building the next LLM turn.
    async fn history(&self) -> Vec<Message>;
    /// The channel of the most recently appended entry that carried one.
    async fn last_channel(&self) -> Option<ChannelRef>;
}

struct Entry {
    message: Message,
    metadata: AppendMetadata,
}

/// In-memory [`SessionStore`], sufficient for the core's own tests and for
/// an embedding binary that has not yet wired a durable log.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<Vec<Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append(&self, message: Message, metadata: AppendMetadata) {
        self.entries.lock().push(Entry { message, metadata });
    }

    async fn history(&self) -> Vec<Message> {
        self.entries.lock().iter().map(|e| e.message.clone()).collect()
    }

    async fn last_channel(&self) -> Option<ChannelRef> {
        self.entries
            .lock()
            .iter()
            .rev()
            .find_map(|e| e.metadata.channel.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::Message;

    #[tokio::test]
    async fn append_is_order_preserving() {
        let store = InMemorySessionStore::new();
        store.append(Message::user("a"), AppendMetadata::default()).await;
        store.append(Message::user("b"), AppendMetadata::default()).await;

        let history = store.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "a");
        assert_eq!(history[1].content, "b");
    }

    #[tokio::test]
    async fn last_channel_returns_most_recent_channel_bearing_entry() {
        let store = InMemorySessionStore::new();
        store
            .append(
                Message::user("a"),
                AppendMetadata::with_channel(ChannelRef::new("cli", "main")),
            )
            .await;
        store.append(Message::assistant("thinking", None), AppendMetadata::default()).await;
        store
            .append(
                Message::user("b"),
                AppendMetadata::with_channel(ChannelRef::new("slack", "c1")),
            )
            .await;

        let channel = store.last_channel().await.unwrap();
        assert_eq!(channel.channel_type, "slack");
    }

    #[tokio::test]
    async fn last_channel_none_when_nothing_appended() {
        let store = InMemorySessionStore::new();
        assert!(store.last_channel().await.is_none());
    }
}
