//! Configuration schema. Every section is `#[serde(default)]` so a
//! partially-filled `fabric.toml` works.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolConfig {
    /// Default per-call timeout when the caller does not specify one.
    pub default_timeout_ms: u64,
    /// Hard ceiling on any tool timeout, including background tasks.
    pub max_timeout_ms: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            max_timeout_ms: 600_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Age past `completedAt`, in seconds, after which a terminal task is erased.
    pub cleanup_age_secs: u64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            cleanup_age_secs: 1_800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TokenStoreConfig {
    /// Directory under which `mcp/<sanitized-name>.json` token files live.
    pub auth_dir: String,
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        Self {
            auth_dir: ".fabric/auth".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefreshMonitorConfig {
    /// Interval between proactive-refresh sweeps.
    pub check_interval_secs: u64,
}

impl Default for RefreshMonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FabricConfig {
    pub tools: ToolConfig,
    pub background: BackgroundConfig,
    pub token_store: TokenStoreConfig,
    pub refresh_monitor: RefreshMonitorConfig,
}
