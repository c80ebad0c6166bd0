//! Main Agent Pump: the single-writer queue that serializes inbound
//! messages, background task results, and self-scheduled `think` steps
//! into LLM turns, routing intent tool calls and delivering user-visible
//! output exclusively through the `reply` callback.
//!
//! A persistent, externally-driven queue rather than a bounded per-request
//! loop: each `think` item produces at most one LLM call, and tool results
//! cascade by re-queuing a fresh item rather than looping in place.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{error, instrument};

use crate::agent::session::{AppendMetadata, SessionStore};
use crate::agent::types::{ChannelRef, Message, QueueItem, ToolCall};
use crate::agent::llm::LlmProvider;
use crate::error::PumpError;
use crate::tools::{BackgroundTaskManager, ExecuteOptions, ToolContext, ToolExecutor, ToolRegistry};

/// A user-visible reply, routed back to whatever channel originated the
/// conversation. The pump owns zero knowledge of channel transport beyond
/// this struct.
#[derive(Debug, Clone)]
pub struct ReplyPayload {
    pub text: String,
    pub channel: ChannelRef,
}

pub type ReplyCallback = Box<dyn Fn(ReplyPayload) + Send + Sync>;

/// Hand-off to an external task system when the model emits
/// `spawn_task`/`spawn_subagent`.
#[async_trait]
pub trait TaskSpawner: Send + Sync {
    /// Returns the spawned task's id. Completion arrives later via
    /// [`AgentPump::notify_task_result`], called by the Task System.
    async fn spawn(&self, description: String, input: Value) -> String;
}

/// Capabilities the pump hands to tools executed via the generic path:
/// `taskId: "main-agent"`, plus whatever memory/session directories and
/// background pool the embedder configured.
pub struct PumpSettings {
    pub system_prompt: String,
    pub memory_dir: Option<PathBuf>,
    pub session_dir: Option<PathBuf>,
}

struct PumpState {
    queue: Mutex<VecDeque<QueueItem>>,
    processing: AtomicBool,
    reply_cb: Mutex<Option<ReplyCallback>>,
    task_spawner: Mutex<Option<Arc<dyn TaskSpawner>>>,
    /// The channel a spawned task should reply on, recorded at spawn time
    /// and keyed by task id, rather than falling back to a placeholder
    /// `{type:"cli", channelId:"main"}`.
    task_channels: Mutex<HashMap<String, ChannelRef>>,
}

/// The Main Agent Pump.
pub struct AgentPump {
    registry: Arc<Mutex<ToolRegistry>>,
    executor: Arc<ToolExecutor>,
    background: Arc<BackgroundTaskManager>,
    session: Arc<dyn SessionStore>,
    llm: Arc<dyn LlmProvider>,
    settings: PumpSettings,
    state: PumpState,
}

const INNER_MONOLOGUE_CONTRACT: &str = "\n\nYour plain text output is inner monologue: it is appended to \
the session but never shown to anyone. The only way to produce user-visible \
output is to call the `reply` tool with the text to deliver.";

impl AgentPump {
    pub fn new(
        registry: Arc<Mutex<ToolRegistry>>,
        executor: Arc<ToolExecutor>,
        background: Arc<BackgroundTaskManager>,
        session: Arc<dyn SessionStore>,
        llm: Arc<dyn LlmProvider>,
        settings: PumpSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            executor,
            background,
            session,
            llm,
            settings,
            state: PumpState {
                queue: Mutex::new(VecDeque::new()),
                processing: AtomicBool::new(false),
                reply_cb: Mutex::new(None),
                task_spawner: Mutex::new(None),
                task_channels: Mutex::new(HashMap::new()),
            },
        })
    }

    /// Registered once; the pump owns zero knowledge of channel transport.
    pub fn set_reply_callback(&self, cb: impl Fn(ReplyPayload) + Send + Sync + 'static) {
        *self.state.reply_cb.lock() = Some(Box::new(cb));
    }

    pub fn set_task_spawner(&self, spawner: Arc<dyn TaskSpawner>) {
        *self.state.task_spawner.lock() = Some(spawner);
    }

    /// Handle a `message` queue item: append the user turn, then queue a
    /// `think` step for the same channel.
    pub fn enqueue_message(self: &Arc<Self>, text: impl Into<String>, channel: ChannelRef) {
        self.push_raw(QueueItem::Message { text: text.into(), channel });
        self.maybe_start_drain();
    }

    /// Called by the task system when a previously spawned task settles.
    /// Routes to the channel recorded at spawn time.
    pub fn notify_task_result(self: &Arc<Self>, task_id: impl Into<String>, success: bool, payload: impl Into<String>) {
        let task_id = task_id.into();
        let channel = self
            .state
            .task_channels
            .lock()
            .get(&task_id)
            .cloned()
            .unwrap_or_else(|| ChannelRef::new("unknown", "unknown"));
        self.push_raw(QueueItem::TaskResult {
            task_id,
            success,
            payload: payload.into(),
            channel,
        });
        self.maybe_start_drain();
    }

    /// `true` once the queue is empty and no drain loop is active — useful
    /// for tests and graceful shutdown, not part of the processing path.
    pub fn is_idle(&self) -> bool {
        !self.state.processing.load(Ordering::SeqCst) && self.state.queue.lock().is_empty()
    }

    /// Poll [`Self::is_idle`] until it holds or `timeout` elapses.
    pub async fn wait_idle(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.is_idle() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn push_raw(&self, item: QueueItem) {
        self.state.queue.lock().push_back(item);
    }

    /// The `processing` gate: if a drain is already running, the item just
    /// pushed will be picked up by it; otherwise this call becomes the sole
    /// consumer.
    fn maybe_start_drain(self: &Arc<Self>) {
        if self
            .state
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let pump = Arc::clone(self);
            tokio::spawn(async move { pump.drain_loop().await });
        }
    }

    async fn drain_loop(self: Arc<Self>) {
        loop {
            let item = self.state.queue.lock().pop_front();
            let Some(item) = item else {
                self.state.processing.store(false, Ordering::SeqCst);
                // A producer may have pushed between the empty check above
                // and the flag clear; re-claim the gate rather than
                // stranding the item with no active drainer.
                if self.state.queue.lock().is_empty() {
                    return;
                }
                if self
                    .state
                    .processing
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    return;
                }
                continue;
            };

            let apology_channel = match &item {
                QueueItem::Message { channel, .. } => Some(channel.clone()),
                QueueItem::Think {
                    channel,
                    from_message: true,
                } => Some(channel.clone()),
                _ => None,
            };

            if let Err(err) = self.process_item(item).await {
                error!(error = %err, "pump item processing failed");
                if let Some(channel) = apology_channel {
                    self.send_apology(channel).await;
                }
            }
        }
    }

    async fn process_item(&self, item: QueueItem) -> Result<(), PumpError> {
        match item {
            QueueItem::Message { text, channel } => self.handle_message(text, channel).await,
            QueueItem::TaskResult {
                task_id,
                success,
                payload,
                channel,
            } => self.handle_task_result(task_id, success, payload, channel).await,
            QueueItem::Think { channel, .. } => self.handle_think(channel).await,
        }
    }

    async fn handle_message(&self, text: String, channel: ChannelRef) -> Result<(), PumpError> {
        self.session
            .append(Message::user(text), AppendMetadata::with_channel(channel.clone()))
            .await;
        self.push_raw(QueueItem::Think {
            channel,
            from_message: true,
        });
        Ok(())
    }

    async fn handle_task_result(
        &self,
        task_id: String,
        success: bool,
        payload: String,
        channel: ChannelRef,
    ) -> Result<(), PumpError> {
        let label = if success { "completed" } else { "failed" };
        let content = format!("[Task {task_id} {label}]\n{payload}");
        let metadata = AppendMetadata {
            channel: Some(channel.clone()),
            extra: Some(json!({"type": "task_result", "taskId": task_id})),
        };
        self.session.append(Message::user(content), metadata).await;
        self.push_raw(QueueItem::Think {
            channel,
            from_message: false,
        });
        Ok(())
    }

    /// One LLM turn. Produces at most one LLM call; tool calls cascade by
    /// re-queuing a fresh `think` item. The cascaded item always carries
    /// `from_message: false` — only the `think` item pushed directly by
    /// [`Self::handle_message`] is eligible to synthesize an apology, never
    /// a chained one.
    #[instrument(skip(self))]
    async fn handle_think(&self, channel: ChannelRef) -> Result<(), PumpError> {
        let history = self.session.history().await;
        let tool_descriptors = self.registry.lock().to_llm_descriptors();
        let system_prompt = format!("{}{}", self.settings.system_prompt, INNER_MONOLOGUE_CONTRACT);

        let turn = self
            .llm
            .complete(&system_prompt, &history, &tool_descriptors)
            .await
            .map_err(PumpError::Other)?;

        if turn.tool_calls.is_empty() {
            if !turn.text.trim().is_empty() {
                self.session
                    .append(Message::assistant(turn.text, None), AppendMetadata::default())
                    .await;
            }
            return Ok(());
        }

        self.session
            .append(
                Message::assistant(turn.text.clone(), Some(turn.tool_calls.clone())),
                AppendMetadata::default(),
            )
            .await;

        for call in &turn.tool_calls {
            self.dispatch_tool_call(call, &channel).await;
        }

        self.push_raw(QueueItem::Think {
            channel,
            from_message: false,
        });
        Ok(())
    }

    /// `reply` and `spawn_task`/`spawn_subagent` are intercepted directly;
    /// every other tool call (including intent tools like `notify`,
    /// `use_skill`, `session_archive_read`) goes through the generic
    /// executor path, whose `result.action` field is for upstream routing
    /// this crate does not implement.
    async fn dispatch_tool_call(&self, call: &ToolCall, channel: &ChannelRef) {
        match call.name.as_str() {
            "reply" => {
                let text = call
                    .arguments
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.session
                    .append(
                        Message::tool_result(call.id.clone(), json!({"delivered": true}).to_string()),
                        AppendMetadata::default(),
                    )
                    .await;
                if let Some(cb) = self.state.reply_cb.lock().as_ref() {
                    cb(ReplyPayload {
                        text,
                        channel: channel.clone(),
                    });
                }
            }
            "spawn_task" | "spawn_subagent" => {
                let description = call
                    .arguments
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let input = call.arguments.get("input").cloned().unwrap_or(Value::Null);

                let spawner = self.state.task_spawner.lock().clone();
                let task_id = match spawner {
                    Some(spawner) => spawner.spawn(description, input).await,
                    None => format!("task-{}", uuid::Uuid::new_v4().simple()),
                };
                self.state.task_channels.lock().insert(task_id.clone(), channel.clone());

                self.session
                    .append(
                        Message::tool_result(
                            call.id.clone(),
                            json!({"taskId": task_id, "status": "spawned"}).to_string(),
                        ),
                        AppendMetadata::default(),
                    )
                    .await;
            }
            other => {
                let ctx = self.tool_context();
                let result = self
                    .executor
                    .execute(other, call.arguments.clone(), &ctx, ExecuteOptions::default())
                    .await;
                let content = match result {
                    Ok(value) => serde_json::to_string(&value).unwrap_or_default(),
                    Err(err) => format!("Error: {err}"),
                };
                self.session
                    .append(Message::tool_result(call.id.clone(), content), AppendMetadata::default())
                    .await;
            }
        }
    }

    fn tool_context(&self) -> ToolContext {
        ToolContext {
            task_id: "main-agent".to_string(),
            user_id: None,
            allowed_paths: None,
            memory_dir: self.settings.memory_dir.clone(),
            session_dir: self.settings.session_dir.clone(),
            background_manager: Some(self.background.clone()),
        }
    }

    /// A failing `message` item synthesizes an apology; `task_result` and
    /// `think` failures are logged but stay silent (the model may decide to
    /// `reply` on a later turn).
    async fn send_apology(&self, channel: ChannelRef) {
        if let Some(cb) = self.state.reply_cb.lock().as_ref() {
            cb(ReplyPayload {
                text: "Sorry, something went wrong processing that.".to_string(),
                channel,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::{Role, ToolCall};
    use crate::event_bus::TokioBroadcastBus;
    use crate::tools::ToolInfo;
    use parking_lot::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;

    fn registry() -> Arc<Mutex<ToolRegistry>> {
        Arc::new(Mutex::new(ToolRegistry::new()))
    }

    fn executor(registry: Arc<Mutex<ToolRegistry>>) -> Arc<ToolExecutor> {
        Arc::new(ToolExecutor::new(registry, Arc::new(TokioBroadcastBus::new()), 5_000))
    }

    fn settings() -> PumpSettings {
        PumpSettings {
            system_prompt: "you are a helpful agent".to_string(),
            memory_dir: None,
            session_dir: None,
        }
    }

    struct ScriptedLlm {
        turns: StdMutex<VecDeque<LlmTurn>>,
        calls: AtomicUsize,
    }

    use crate::agent::llm::LlmTurn;

    impl ScriptedLlm {
        fn new(turns: Vec<LlmTurn>) -> Self {
            Self {
                turns: StdMutex::new(turns.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn complete(&self, _system_prompt: &str, _messages: &[Message], _tools: &[ToolInfo]) -> Result<LlmTurn, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.turns.lock().pop_front().unwrap_or_default())
        }
    }

    fn pump(llm: Arc<dyn LlmProvider>) -> Arc<AgentPump> {
        let registry = registry();
        let exec = executor(registry.clone());
        let background = Arc::new(BackgroundTaskManager::new());
        let session = Arc::new(crate::agent::session::InMemorySessionStore::new());
        AgentPump::new(registry, exec, background, session, llm, settings())
    }

    fn reply_call(text: &str) -> ToolCall {
        ToolCall {
            id: "call-1".to_string(),
            name: "reply".to_string(),
            arguments: json!({"text": text}),
        }
    }

    #[tokio::test]
    async fn plain_text_without_reply_is_inner_monologue_only() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmTurn {
            text: "ok".to_string(),
            tool_calls: vec![],
        }]));
        let replies: Arc<StdMutex<Vec<ReplyPayload>>> = Arc::new(StdMutex::new(Vec::new()));
        let pump = pump(llm);
        let sink = replies.clone();
        pump.set_reply_callback(move |r| sink.lock().push(r));

        pump.enqueue_message("hi", ChannelRef::new("cli", "main"));
        pump.wait_idle(Duration::from_secs(2)).await;

        assert!(replies.lock().is_empty(), "plain text must never reach the reply callback");
    }

    #[tokio::test]
    async fn reply_tool_call_delivers_exactly_once() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmTurn {
                text: "no reply yet".to_string(),
                tool_calls: vec![],
            },
            LlmTurn {
                text: String::new(),
                tool_calls: vec![reply_call("hello")],
            },
        ]));
        let replies: Arc<StdMutex<Vec<ReplyPayload>>> = Arc::new(StdMutex::new(Vec::new()));
        let pump = pump(llm);
        let sink = replies.clone();
        pump.set_reply_callback(move |r| sink.lock().push(r));

        pump.enqueue_message("hi", ChannelRef::new("cli", "main"));
        pump.wait_idle(Duration::from_secs(2)).await;

        // First think produced no tool calls, so the pump stops; a second
        // external message is needed to trigger the next think.
        pump.enqueue_message("anything else?", ChannelRef::new("cli", "main"));
        pump.wait_idle(Duration::from_secs(2)).await;

        let delivered = replies.lock();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].text, "hello");
    }

    struct RecordingSpawner {
        spawned: StdMutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl TaskSpawner for RecordingSpawner {
        async fn spawn(&self, description: String, input: Value) -> String {
            self.spawned.lock().push((description.clone(), input));
            "task-1".to_string()
        }
    }

    #[tokio::test]
    async fn spawn_task_then_result_cascades_into_reply() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmTurn {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: "call-1".to_string(),
                    name: "spawn_task".to_string(),
                    arguments: json!({"description": "do a thing", "input": {"x": 1}}),
                }],
            },
            LlmTurn {
                text: "noted".to_string(),
                tool_calls: vec![],
            },
            LlmTurn {
                text: String::new(),
                tool_calls: vec![reply_call("done")],
            },
        ]));
        let replies: Arc<StdMutex<Vec<ReplyPayload>>> = Arc::new(StdMutex::new(Vec::new()));
        let pump = pump(llm);
        let sink = replies.clone();
        pump.set_reply_callback(move |r| sink.lock().push(r));

        let spawner = Arc::new(RecordingSpawner {
            spawned: StdMutex::new(Vec::new()),
        });
        pump.set_task_spawner(spawner.clone());

        pump.enqueue_message("go do something", ChannelRef::new("cli", "main"));
        pump.wait_idle(Duration::from_secs(2)).await;

        assert_eq!(spawner.spawned.lock().len(), 1);

        pump.notify_task_result("task-1", true, "{\"x\":1}");
        pump.wait_idle(Duration::from_secs(2)).await;

        let delivered = replies.lock();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].text, "done");
    }

    #[tokio::test]
    async fn failing_message_think_synthesizes_apology() {
        struct FailingLlm;
        #[async_trait]
        impl LlmProvider for FailingLlm {
            async fn complete(&self, _: &str, _: &[Message], _: &[ToolInfo]) -> Result<LlmTurn, String> {
                Err("provider unavailable".to_string())
            }
        }

        let replies: Arc<StdMutex<Vec<ReplyPayload>>> = Arc::new(StdMutex::new(Vec::new()));
        let pump = pump(Arc::new(FailingLlm));
        let sink = replies.clone();
        pump.set_reply_callback(move |r| sink.lock().push(r));

        pump.enqueue_message("hi", ChannelRef::new("cli", "main"));
        pump.wait_idle(Duration::from_secs(2)).await;

        let delivered = replies.lock();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].text.to_lowercase().contains("sorry"));
    }

    #[tokio::test]
    async fn session_append_order_matches_processing_order() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmTurn {
            text: "thinking".to_string(),
            tool_calls: vec![],
        }]));
        let registry = registry();
        let exec = executor(registry.clone());
        let background = Arc::new(BackgroundTaskManager::new());
        let session = Arc::new(crate::agent::session::InMemorySessionStore::new());
        let pump = AgentPump::new(registry, exec, background, session.clone(), llm, settings());

        pump.enqueue_message("first", ChannelRef::new("cli", "main"));
        pump.wait_idle(Duration::from_secs(2)).await;

        let history = session.history().await;
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "thinking");
    }
}
