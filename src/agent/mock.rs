//! `MockAgentClient` — plays back a fixed script of responses in order.
//! Grounded on the teacher's `mock::MockLlmClient` (`llm/client.rs`).

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use chrono::Utc;

use crate::domain::{AgentResponse, AgentStatus};

use super::client::{AgentCallOptions, AgentClient};
use super::error::AgentError;

pub struct MockAgentClient {
    scripted_responses: Vec<AgentResponse>,
    call_count: AtomicUsize,
}

impl MockAgentClient {
    pub fn new(scripted_responses: Vec<AgentResponse>) -> Self {
        Self {
            scripted_responses,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn call(&self, persona: &str, _prompt: &str, options: AgentCallOptions) -> Result<AgentResponse, AgentError> {
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        debug!(persona, index, "MockAgentClient::call: called");

        if options.abort_signal.is_some_and(|t| t.is_cancelled()) {
            return Ok(AgentResponse {
                persona: persona.to_string(),
                status: AgentStatus::Interrupted,
                content: String::new(),
                timestamp: Utc::now(),
                session_id: None,
                matched_rule_index: None,
                matched_rule_method: None,
                structured_output: None,
            });
        }

        self.scripted_responses
            .get(index)
            .cloned()
            .ok_or_else(|| AgentError::Provider("no more scripted responses".to_string()))
    }
}
