//! TOML configuration for the fabric's own ambient defaults (timeouts, the
//! token-store auth directory, and the refresh monitor's check interval).
//!
//! This is plumbing an embedding binary uses to avoid hardcoding the numbers
//! the core components accept as constructor arguments.

mod loader;
mod schema;

pub use loader::{default_config_path, load_config, load_default_config};
pub use schema::{BackgroundConfig, FabricConfig, RefreshMonitorConfig, TokenStoreConfig, ToolConfig};
