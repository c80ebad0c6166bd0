//! Tool Executor: validates and runs a single tool call against the
//! registry, enforcing the timeout ceiling and emitting lifecycle events.
//!
//! Resolve → validate → invoke under a timeout race → record stats → emit
//! the completion event. Policy/permission gating lives one layer up, in
//! the caller's cognitive loop — this executor only enforces shape and time.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, instrument, warn};

use crate::error::ToolError;
use crate::event_bus::{EventBus, FabricEvent};
use crate::tools::registry::ToolRegistry;
use crate::tools::traits::{ToolContext, ToolResult};

/// Hard ceiling on any single tool call, regardless of a caller-requested
/// timeout.
pub const MAX_TOOL_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Caller-requested timeout; clamped to `MAX_TOOL_TIMEOUT_MS`.
    pub timeout_ms: Option<u64>,
}

pub struct ToolExecutor {
    registry: Arc<Mutex<ToolRegistry>>,
    bus: Arc<dyn EventBus>,
    default_timeout_ms: u64,
}

impl ToolExecutor {
    pub fn new(registry: Arc<Mutex<ToolRegistry>>, bus: Arc<dyn EventBus>, default_timeout_ms: u64) -> Self {
        Self {
            registry,
            bus,
            default_timeout_ms,
        }
    }

    /// Run `name` with `args` under `ctx`: emit requested, resolve, validate,
    /// race against the timeout ceiling, record stats, return the result
    /// (and separately emit completion/failure).
    ///
    /// Returns the typed `Result<Value, ToolError>` callers branch on
    /// directly; use [`Self::execute_full`] for the `ToolResult` shape
    /// (timestamps + duration) when a caller needs those fields too — both
    /// share this call's resolve/validate/timeout/stats machinery.
    #[instrument(skip(self, args, ctx), fields(tool = %name, task_id = %ctx.task_id))]
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
        options: ExecuteOptions,
    ) -> Result<Value, ToolError> {
        let (outcome, _) = self.run_and_record(name, args, ctx, options).await;
        outcome
    }

    /// A `ToolResult`: `{success, result?, error?, startedAt, completedAt,
    /// durationMs}`, with exactly one of `result`/`error` meaningful per
    /// `success`. The error message is `ToolError::to_string()` — callers
    /// that need the discriminated kind
    /// (`NotFound | Validation | Timeout | Permission | Unknown`) should use
    /// [`Self::execute`] instead, which preserves the typed `ToolError`.
    pub async fn execute_full(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
        options: ExecuteOptions,
    ) -> ToolResult {
        let (outcome, (started_at, completed_at)) = self.run_and_record(name, args, ctx, options).await;
        match outcome {
            Ok(value) => ToolResult::ok(started_at, completed_at, value),
            Err(err) => ToolResult::err(started_at, completed_at, err.to_string()),
        }
    }

    /// Shared resolve/validate/timeout/stats/event-emission core behind
    /// both public entry points; only the error representation differs.
    async fn run_and_record(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
        options: ExecuteOptions,
    ) -> (Result<Value, ToolError>, (i64, i64)) {
        let task_id = Some(ctx.task_id.clone());
        let _ = self.bus.publish(FabricEvent::ToolCallRequested {
            tool_name: name.to_string(),
            task_id: task_id.clone(),
        });

        let started_at = now_ms();
        let outcome = self.run_once(name, args, ctx, options).await;
        let completed_at = now_ms();

        {
            let mut registry = self.registry.lock();
            registry.update_call_stats(name, completed_at - started_at, outcome.is_ok());
        }

        self.emit_completion(name, task_id, &outcome);
        (outcome, (started_at, completed_at))
    }

    async fn run_once(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
        options: ExecuteOptions,
    ) -> Result<Value, ToolError> {
        let tool = {
            let registry = self.registry.lock();
            registry.get(name)
        };
        let Some(tool) = tool else {
            return Err(ToolError::NotFound(name.to_string()));
        };

        let issues = tool.parameter_schema().validate(&args);
        if !issues.is_empty() {
            return Err(ToolError::Validation(issues.join("; ")));
        }

        let timeout_ms = options
            .timeout_ms
            .unwrap_or(self.default_timeout_ms)
            .min(MAX_TOOL_TIMEOUT_MS);

        debug!(tool = name, timeout_ms, "running tool call");
        match tokio_timeout(Duration::from_millis(timeout_ms), tool.execute(args, ctx)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(tool = name, error = %err, "tool call failed");
                Err(err)
            }
            Err(_elapsed) => {
                warn!(tool = name, timeout_ms, "tool call timed out");
                Err(ToolError::Timeout(timeout_ms))
            }
        }
    }

    fn emit_completion(&self, name: &str, task_id: Option<String>, result: &Result<Value, ToolError>) {
        let event = match result {
            Ok(value) => FabricEvent::ToolCallCompleted {
                tool_name: name.to_string(),
                task_id,
                result: value.clone(),
            },
            Err(err) => FabricEvent::ToolCallFailed {
                tool_name: name.to_string(),
                task_id,
                error: err.to_string(),
            },
        };
        let _ = self.bus.publish(event);
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::TokioBroadcastBus;
    use crate::tools::schema::{Field, FieldType, ParamSchema};
    use crate::tools::traits::{Tool, ToolCategory};
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes the \"value\" field"
        }
        fn category(&self) -> ToolCategory {
            ToolCategory::Other("test".to_string())
        }
        fn parameter_schema(&self) -> ParamSchema {
            ParamSchema::new().field(Field::new("value", FieldType::String))
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
            Ok(args["value"].clone())
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "never returns in time"
        }
        fn parameter_schema(&self) -> ParamSchema {
            ParamSchema::new()
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    fn executor_with(tools: Vec<Arc<dyn Tool>>) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool).unwrap();
        }
        ToolExecutor::new(
            Arc::new(Mutex::new(registry)),
            Arc::new(TokioBroadcastBus::new()),
            30_000,
        )
    }

    #[tokio::test]
    async fn executes_known_tool_successfully() {
        let executor = executor_with(vec![Arc::new(EchoTool)]);
        let ctx = ToolContext::new("t1");
        let result = executor
            .execute("echo", json!({"value": "hi"}), &ctx, ExecuteOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!("hi"));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let executor = executor_with(vec![]);
        let ctx = ToolContext::new("t1");
        let err = executor
            .execute("missing", json!({}), &ctx, ExecuteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_arguments_are_rejected_before_execution() {
        let executor = executor_with(vec![Arc::new(EchoTool)]);
        let ctx = ToolContext::new("t1");
        let err = executor
            .execute("echo", json!({}), &ctx, ExecuteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn timeout_is_enforced() {
        let executor = executor_with(vec![Arc::new(SlowTool)]);
        let ctx = ToolContext::new("t1");
        let err = executor
            .execute(
                "slow",
                json!({}),
                &ctx,
                ExecuteOptions {
                    timeout_ms: Some(20),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(20)));
    }

    #[tokio::test]
    async fn caller_timeout_is_clamped_to_ceiling() {
        let executor = executor_with(vec![Arc::new(EchoTool)]);
        let ctx = ToolContext::new("t1");
        let result = executor
            .execute(
                "echo",
                json!({"value": "x"}),
                &ctx,
                ExecuteOptions {
                    timeout_ms: Some(MAX_TOOL_TIMEOUT_MS + 1_000_000),
                },
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn stats_are_recorded_on_success_and_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let registry = Arc::new(Mutex::new(registry));
        let executor = ToolExecutor::new(registry.clone(), Arc::new(TokioBroadcastBus::new()), 30_000);
        let ctx = ToolContext::new("t1");

        executor
            .execute("echo", json!({"value": "a"}), &ctx, ExecuteOptions::default())
            .await
            .unwrap();
        let _ = executor
            .execute("echo", json!({}), &ctx, ExecuteOptions::default())
            .await;

        let stats = registry.lock().get_stats();
        let echo_stats = &stats.tools["echo"];
        assert_eq!(echo_stats.count, 2);
        assert_eq!(echo_stats.failures, 1);
    }

    #[tokio::test]
    async fn execute_full_success_has_result_and_no_error() {
        let executor = executor_with(vec![Arc::new(EchoTool)]);
        let ctx = ToolContext::new("t1");
        let result = executor
            .execute_full("echo", json!({"value": "hi"}), &ctx, ExecuteOptions::default())
            .await;

        assert!(result.success);
        assert_eq!(result.result, Some(json!("hi")));
        assert!(result.error.is_none());
        assert_eq!(result.duration_ms, result.completed_at - result.started_at);
    }

    #[tokio::test]
    async fn execute_full_failure_has_error_and_no_result() {
        let executor = executor_with(vec![]);
        let ctx = ToolContext::new("t1");
        let result = executor
            .execute_full("missing", json!({}), &ctx, ExecuteOptions::default())
            .await;

        assert!(!result.success);
        assert!(result.result.is_none());
        assert!(result.error.unwrap().contains("not found"));
    }
}
