//! `fabricd` — headless CLI entrypoint wiring the Main Agent Pump to stdin.
//!
//! This crate has no channel adapters or LLM provider SDK of its own;
//! `fabricd` exists to demonstrate that the pieces wire together end to end
//! from a terminal, not to be a full product surface.

use std::io::{self, BufRead};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use parking_lot::Mutex;
use serde_json::json;

use fabric_core::agent::{
    AgentPump, ChannelRef, LlmProvider, LlmTurn, Message, PumpSettings, ToolCall,
};
use fabric_core::agent::InMemorySessionStore;
use fabric_core::config::load_default_config;
use fabric_core::event_bus::TokioBroadcastBus;
use fabric_core::tools::{BackgroundTaskManager, ToolExecutor, ToolInfo, ToolRegistry};

#[derive(Parser, Debug)]
#[command(name = "fabricd", about = "Agent fabric daemon / REPL", version)]
struct Cli {
    /// Print each prompt's raw LLM turn instead of just the delivered reply.
    #[arg(long)]
    verbose: bool,
}

/// Placeholder [`LlmProvider`] that always replies with the echoed input.
///
/// `fabricd` has no provider SDK wired in; this stand-in exists so the
/// pump's queue, tool dispatch, and reply plumbing can be exercised end to
/// end from a terminal.
struct EchoLlmProvider;

#[async_trait]
impl LlmProvider for EchoLlmProvider {
    async fn complete(
        &self,
        _system_prompt: &str,
        messages: &[Message],
        _tools: &[ToolInfo],
    ) -> Result<LlmTurn, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == fabric_core::agent::Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(LlmTurn {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: uuid::Uuid::new_v4().to_string(),
                name: "reply".to_string(),
                arguments: json!({ "text": format!("echo: {last_user}") }),
            }],
        })
    }
}

#[tokio::main]
async fn main() {
    fabric_core::logging::init();
    let cli = Cli::parse();

    let config = load_default_config();
    let registry = Arc::new(Mutex::new(ToolRegistry::new()));
    let bus = Arc::new(TokioBroadcastBus::new());
    let executor = Arc::new(ToolExecutor::new(
        registry.clone(),
        bus,
        config.tools.default_timeout_ms,
    ));
    let background = Arc::new(BackgroundTaskManager::new());
    let session = Arc::new(InMemorySessionStore::new());

    let pump = AgentPump::new(
        registry,
        executor,
        background,
        session,
        Arc::new(EchoLlmProvider),
        PumpSettings {
            system_prompt: "You are a helpful assistant.".to_string(),
            memory_dir: None,
            session_dir: None,
        },
    );

    let verbose = cli.verbose;
    pump.set_reply_callback(move |reply| {
        if verbose {
            println!("[{}:{}] {}", reply.channel.channel_type, reply.channel.channel_id, reply.text);
        } else {
            println!("{}", reply.text);
        }
    });

    println!("fabricd REPL. Type a message and press enter; Ctrl-D to exit.");
    let stdin = io::stdin();
    let channel = ChannelRef::new("cli", "main");
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        pump.enqueue_message(trimmed.to_string(), channel.clone());
        pump.wait_idle(std::time::Duration::from_secs(30)).await;
    }
}
