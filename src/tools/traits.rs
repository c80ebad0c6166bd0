//! Tool interface and supporting data model.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;
use crate::tools::background::BackgroundTaskManager;
use crate::tools::schema::ParamSchema;

/// Coarse grouping used by `list_by_category`. Kept open-ended via
/// `Other(String)` since no fixed category set is enumerated upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    File,
    Shell,
    Network,
    Memory,
    Agent,
    Mcp,
    Other(String),
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolCategory::File => write!(f, "file"),
            ToolCategory::Shell => write!(f, "shell"),
            ToolCategory::Network => write!(f, "network"),
            ToolCategory::Memory => write!(f, "memory"),
            ToolCategory::Agent => write!(f, "agent"),
            ToolCategory::Mcp => write!(f, "mcp"),
            ToolCategory::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Capabilities supplied to a tool invocation.
///
/// Every field is a permission: its absence means the capability is denied,
/// not merely unset.
#[derive(Clone, Default)]
pub struct ToolContext {
    pub task_id: String,
    pub user_id: Option<String>,
    /// Whitelist of normalized filesystem prefixes. `None` means unrestricted.
    pub allowed_paths: Option<Vec<PathBuf>>,
    pub memory_dir: Option<PathBuf>,
    pub session_dir: Option<PathBuf>,
    pub background_manager: Option<Arc<BackgroundTaskManager>>,
}

impl ToolContext {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            ..Default::default()
        }
    }

    /// A path is allowed iff its normalized form equals an allowed path or
    /// begins with `<allowed>/`. Absence of `allowed_paths` means
    /// unrestricted.
    pub fn is_path_allowed(&self, path: &std::path::Path) -> bool {
        let Some(allowed) = &self.allowed_paths else {
            return true;
        };
        let normalized = normalize(path);
        allowed.iter().any(|a| {
            let a = normalize(a);
            normalized == a || normalized.starts_with(&format!("{a}/"))
        })
    }
}

fn normalize(path: &std::path::Path) -> String {
    // `Path::components()` performs `.`/`..` resolution lexically without
    // touching the filesystem, which is what a permission check needs.
    let mut out = Vec::new();
    for comp in path.components() {
        match comp {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str().to_string_lossy().to_string()),
        }
    }
    out.join("/")
}

/// Result of executing a tool call.
///
/// Invariant: exactly one of `result`/`error` is meaningful, discriminated
/// by `success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: i64,
    pub completed_at: i64,
    pub duration_ms: i64,
}

impl ToolResult {
    pub fn ok(started_at: i64, completed_at: i64, result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            started_at,
            completed_at,
            duration_ms: completed_at - started_at,
        }
    }

    pub fn err(started_at: i64, completed_at: i64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            started_at,
            completed_at,
            duration_ms: completed_at - started_at,
        }
    }
}

/// Summary of a registered tool suitable for LLM `tools` arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A capability the agent loop can invoke.
///
/// Names must match `[A-Za-z0-9_.-]+` (enforced by [`crate::tools::registry::ToolRegistry::register`]).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn category(&self) -> ToolCategory {
        ToolCategory::Other("unknown".to_string())
    }

    /// Structural validation schema — the source of truth for argument
    /// validation at the executor boundary.
    fn parameter_schema(&self) -> ParamSchema;

    /// An explicit JSON Schema to use verbatim in LLM descriptors instead of
    /// deriving one from `parameter_schema()`.
    fn explicit_json_schema(&self) -> Option<Value> {
        None
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// Validate `args` against `schema`, returning the list of human-readable
/// validation issues (empty on success).
pub fn validate_arguments(schema: &ParamSchema, args: &Value) -> Vec<String> {
    schema.validate(args)
}

pub type ToolArguments = HashMap<String, Value>;
