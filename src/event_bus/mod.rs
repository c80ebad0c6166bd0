mod tokio_bus;
mod traits;

pub use tokio_bus::{NullBus, TokioBroadcastBus};
pub use traits::{EventBus, FabricEvent};
