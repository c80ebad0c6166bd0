use tokio::sync::broadcast;

use super::traits::{EventBus, FabricEvent};

const DEFAULT_CAPACITY: usize = 1024;

/// [`EventBus`] implementation backed by a `tokio::sync::broadcast` channel.
pub struct TokioBroadcastBus {
    sender: broadcast::Sender<FabricEvent>,
}

impl TokioBroadcastBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for TokioBroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for TokioBroadcastBus {
    fn publish(&self, event: FabricEvent) -> Result<(), String> {
        // `send` returns the subscriber count; zero subscribers is fine.
        self.sender.send(event).map(|_| ()).map_err(|e| e.to_string())
    }

    fn subscribe(&self) -> broadcast::Receiver<FabricEvent> {
        self.sender.subscribe()
    }
}

/// An [`EventBus`] that discards every event. Used as a default sink when
/// an embedder has no subscriber wired up yet.
pub struct NullBus {
    // Kept alive so `subscribe()` can hand out receivers without leaking a
    // sender per call; nothing is ever published on it.
    sender: broadcast::Sender<FabricEvent>,
}

impl NullBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }
}

impl Default for NullBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for NullBus {
    fn publish(&self, _event: FabricEvent) -> Result<(), String> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<FabricEvent> {
        self.sender.subscribe()
    }
}
