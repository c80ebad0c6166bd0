//! Background Task Manager: fire-and-forget execution of long-running tool
//! calls with status polling and cancellation.
//!
//! Cancellation is an `Arc<AtomicBool>` checked inside the running task;
//! the shared task map uses `dashmap` for lock-free concurrent access from
//! spawned tasks and pollers alike.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::timeout as tokio_timeout;

use crate::error::ToolError;
use crate::tools::executor::{ExecuteOptions, ToolExecutor};
use crate::tools::traits::ToolContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundTaskStatus {
    pub id: String,
    pub tool: String,
    pub status: BackgroundStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

struct BackgroundTask {
    tool: String,
    status: BackgroundStatus,
    result: Option<Value>,
    error: Option<String>,
    started_at: i64,
    completed_at: Option<i64>,
    cancel: Arc<AtomicBool>,
    settled: Arc<Notify>,
    /// Set once a terminal state has been written, so a later natural
    /// settlement can never overwrite a `stop()`-induced failure.
    finalized: bool,
}

/// Manages fire-and-forget tool executions that run past a single request
/// lifetime.
///
/// Tasks are never persisted across restarts; the map is purely in-memory.
pub struct BackgroundTaskManager {
    tasks: DashMap<String, BackgroundTask>,
}

const DEFAULT_CLEANUP_AGE: Duration = Duration::from_secs(30 * 60);

impl BackgroundTaskManager {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Start `fut` as a background task named `tool`, returning its id
    /// immediately. `fut` must itself respect `cancel` if it wants
    /// cooperative cancellation; it is always raced against `timeout`.
    ///
    /// Requires `Arc<Self>` so the spawned task can share the map.
    pub fn run<F>(self: &Arc<Self>, tool: impl Into<String>, timeout: Duration, fut: F) -> String
    where
        F: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.cleanup(DEFAULT_CLEANUP_AGE);

        let id = format!("bg-{}", short_id());
        let tool = tool.into();
        let now = now_ms();
        let cancel = Arc::new(AtomicBool::new(false));
        let settled = Arc::new(Notify::new());

        self.tasks.insert(
            id.clone(),
            BackgroundTask {
                tool: tool.clone(),
                status: BackgroundStatus::Running,
                result: None,
                error: None,
                started_at: now,
                completed_at: None,
                cancel: cancel.clone(),
                settled: settled.clone(),
                finalized: false,
            },
        );

        let tasks = Arc::clone(self);
        let task_id = id.clone();
        let timeout_ms = timeout.as_millis() as u64;
        tokio::spawn(async move {
            let outcome = tokio_timeout(timeout, fut).await;
            tasks.settle(&task_id, outcome, timeout_ms);
        });

        id
    }

    /// `run()` specialized to the common case of spec §4.3: back a
    /// background task with a plain named tool invocation through the
    /// executor, rather than an arbitrary future. `timeout` is clamped to
    /// [`crate::tools::executor::MAX_TOOL_TIMEOUT_MS`] by the executor the
    /// same way a synchronous call would be.
    pub fn run_tool(
        self: &Arc<Self>,
        executor: Arc<ToolExecutor>,
        tool: impl Into<String>,
        args: Value,
        ctx: ToolContext,
        timeout: Duration,
    ) -> String {
        let tool = tool.into();
        let name = tool.clone();
        self.run(tool, timeout, async move {
            executor
                .execute(&name, args, &ctx, ExecuteOptions {
                    timeout_ms: Some(timeout.as_millis() as u64),
                })
                .await
        })
    }

    /// Pure, non-suspending status read.
    pub fn get_status(&self, id: &str) -> Option<BackgroundTaskStatus> {
        self.tasks.get(id).map(|t| BackgroundTaskStatus {
            id: id.to_string(),
            tool: t.tool.clone(),
            status: t.status,
            result: t.result.clone(),
            error: t.error.clone(),
            started_at: t.started_at,
            completed_at: t.completed_at,
        })
    }

    /// Wait for `id` to settle, racing a `timeout_ms` timer. Returns the
    /// current status whether or not settlement happened before the timer —
    /// the timer winning never marks the task failed.
    pub async fn wait_for(&self, id: &str, timeout_ms: u64) -> Option<BackgroundTaskStatus> {
        let notify = self.tasks.get(id)?.settled.clone();
        let already_done = !matches!(self.tasks.get(id)?.status, BackgroundStatus::Running);
        if !already_done {
            let _ = tokio_timeout(Duration::from_millis(timeout_ms), notify.notified()).await;
        }
        self.get_status(id)
    }

    /// Cancel a running task. Irreversible: any later natural settlement of
    /// the same execution is discarded once `finalized` is set.
    pub fn stop(&self, id: &str) -> bool {
        let Some(mut task) = self.tasks.get_mut(id) else {
            return false;
        };
        if task.status != BackgroundStatus::Running {
            return false;
        }
        task.cancel.store(true, Ordering::SeqCst);
        task.status = BackgroundStatus::Failed;
        task.error = Some("Stopped by user".to_string());
        task.completed_at = Some(now_ms());
        task.finalized = true;
        task.settled.notify_waiters();
        true
    }

    /// Erase completed/failed tasks older than `max_age`. Running tasks are
    /// never erased.
    pub fn cleanup(&self, max_age: Duration) {
        let cutoff = now_ms() - max_age.as_millis() as i64;
        self.tasks.retain(|_, t| match t.completed_at {
            Some(completed_at) => completed_at > cutoff,
            None => true,
        });
    }

    fn settle(
        &self,
        id: &str,
        outcome: Result<Result<Value, ToolError>, tokio::time::error::Elapsed>,
        timeout_ms: u64,
    ) {
        let Some(mut task) = self.tasks.get_mut(id) else {
            return;
        };
        if task.finalized {
            return;
        }
        task.finalized = true;
        task.completed_at = Some(now_ms());
        match outcome {
            Ok(Ok(value)) => {
                task.status = BackgroundStatus::Completed;
                task.result = Some(value);
            }
            Ok(Err(err)) => {
                task.status = BackgroundStatus::Failed;
                task.error = Some(err.to_string());
            }
            Err(_elapsed) => {
                task.status = BackgroundStatus::Failed;
                task.error = Some(format!("Background task timed out after {timeout_ms}ms"));
            }
        }
        task.settled.notify_waiters();
    }
}

impl Default for BackgroundTaskManager {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..10].to_string()
}
