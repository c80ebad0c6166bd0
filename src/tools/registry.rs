//! Tool Registry: the lookup table of everything the pump and executor can
//! invoke, plus per-tool call statistics.
//!
//! HashMap-backed, with insertion-ordered `list()`/`list_filtered()`.
//! Registration fails closed (`DuplicateTool`) rather than silently
//! overwriting, so two tools can never shadow each other.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::tools::traits::{Tool, ToolCategory, ToolInfo};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("tool \"{0}\" is already registered")]
    DuplicateTool(String),
    #[error("tool name \"{0}\" is invalid; names must match [A-Za-z0-9_.-]+")]
    InvalidName(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallStats {
    pub count: u64,
    pub failures: u64,
    pub total_duration_ms: i64,
}

impl ToolCallStats {
    pub fn average_duration_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    pub tools: HashMap<String, ToolCallStats>,
    pub by_category: HashMap<String, u64>,
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

/// Registry of [`Tool`] implementations, keyed by name, insertion-order
/// stable for `list()`.
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
    stats: HashMap<String, ToolCallStats>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            tools: HashMap::new(),
            stats: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if !is_valid_name(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.order.push(name.clone());
        self.stats.insert(name.clone(), ToolCallStats::default());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register every tool, or roll back and report the first failure.
    pub fn register_many(
        &mut self,
        tools: impl IntoIterator<Item = Arc<dyn Tool>>,
    ) -> Result<(), RegistryError> {
        let mut registered = Vec::new();
        for tool in tools {
            let name = tool.name().to_string();
            match self.register(tool) {
                Ok(()) => registered.push(name),
                Err(e) => {
                    for name in registered {
                        self.order.retain(|n| n != &name);
                        self.tools.remove(&name);
                        self.stats.remove(&name);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    pub fn list_by_category(&self, category: &ToolCategory) -> Vec<Arc<dyn Tool>> {
        self.list()
            .into_iter()
            .filter(|t| &t.category() == category)
            .collect()
    }

    /// LLM tool descriptors: a tool's explicit JSON Schema wins verbatim,
    /// else one is derived from its `ParamSchema`.
    pub fn to_llm_descriptors(&self) -> Vec<ToolInfo> {
        self.list()
            .into_iter()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool
                    .explicit_json_schema()
                    .unwrap_or_else(|| tool.parameter_schema().to_json_schema()),
            })
            .collect()
    }

    pub fn update_call_stats(&mut self, name: &str, duration_ms: i64, success: bool) {
        let entry = self.stats.entry(name.to_string()).or_default();
        entry.count += 1;
        entry.total_duration_ms += duration_ms;
        if !success {
            entry.failures += 1;
        }
    }

    pub fn get_stats(&self) -> RegistryStats {
        let mut by_category: HashMap<String, u64> = HashMap::new();
        for tool in self.list() {
            *by_category.entry(tool.category().to_string()).or_insert(0) += 1;
        }
        RegistryStats {
            tools: self.stats.clone(),
            by_category,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
