//! The `AgentClient` trait: `call(persona, prompt, options) -> AgentResponse`.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::domain::AgentResponse;

use super::error::AgentError;

/// A discriminated streaming event, mirroring the consumed contract's
/// `{init|text|thinking|tool_use|tool_result|tool_output|result|error}`
/// union. `Result`/`Error` are terminal; every other variant may repeat.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Init,
    Text(String),
    Thinking(String),
    ToolUse { name: String, input: serde_json::Value },
    ToolResult { name: String, output: String },
    ToolOutput(String),
    Result(Box<AgentResponse>),
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct AgentCallOptions {
    pub cwd: Option<PathBuf>,
    pub session_id: Option<String>,
    pub allowed_tools: Vec<String>,
    pub mcp_servers: HashMap<String, serde_yaml::Value>,
    pub model: Option<String>,
    pub max_turns: Option<u32>,
    pub system_prompt: Option<String>,
    pub permission_mode: crate::domain::PermissionMode,
    pub bypass_permissions: bool,
    pub output_schema: Option<serde_json::Value>,

    /// Checked before (and, for a real streaming provider, during) the
    /// call; a cancelled token surfaces as `AgentStatus::Interrupted`
    /// rather than a retried error.
    pub abort_signal: Option<CancelToken>,

    /// When set, the client streams `StreamEvent`s here as they arrive in
    /// addition to returning the final `AgentResponse`.
    pub on_stream: Option<mpsc::Sender<StreamEvent>>,
}

#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Run one agent call against `persona`'s system prompt with `prompt`
    /// as the user turn, blocking until the agent reaches a terminal
    /// status. Each call is independent unless `options.session_id` names
    /// a prior session to continue.
    async fn call(&self, persona: &str, prompt: &str, options: AgentCallOptions) -> Result<AgentResponse, AgentError>;
}
