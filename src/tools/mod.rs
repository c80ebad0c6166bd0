mod background;
mod executor;
mod registry;
mod schema;
mod traits;

pub use background::{BackgroundStatus, BackgroundTaskManager, BackgroundTaskStatus};
pub use executor::{ExecuteOptions, MAX_TOOL_TIMEOUT_MS, ToolExecutor};
pub use registry::{RegistryError, RegistryStats, ToolCallStats, ToolRegistry};
pub use schema::{Field, FieldType, ParamSchema};
pub use traits::{Tool, ToolArguments, ToolCategory, ToolContext, ToolInfo, ToolResult, validate_arguments};
