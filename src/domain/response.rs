//! AgentResponse and Session — the per-movement conversational record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The outcome of one agent call against a movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub persona: String,
    pub status: AgentStatus,
    pub content: String,
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub matched_rule_index: Option<usize>,

    #[serde(default)]
    pub matched_rule_method: Option<RuleMatchMethod>,

    #[serde(default)]
    pub structured_output: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Done,
    Blocked,
    Error,
    Interrupted,
    Cancelled,
    Answer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMatchMethod {
    Tag,
    Aggregate,
    Textual,
    AiJudge,
}

/// A per-movement conversational session with the agent provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub movement: String,
    pub provider_session_id: Option<String>,
    pub mode: SessionMode,
}

impl Session {
    pub fn fresh(movement: impl Into<String>) -> Self {
        Self {
            movement: movement.into(),
            provider_session_id: None,
            mode: SessionMode::Fresh,
        }
    }

    pub fn continued(movement: impl Into<String>, provider_session_id: impl Into<String>) -> Self {
        Self {
            movement: movement.into(),
            provider_session_id: Some(provider_session_id.into()),
            mode: SessionMode::Continued,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    Fresh,
    Continued,
}
