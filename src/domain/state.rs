//! EngineState — the mutable state threaded through one Piece Engine run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::response::Session;

/// Per-run state owned exclusively by one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    /// Strictly increases by 1 per loop head; never exceeds the piece's
    /// effective `max_movements`.
    pub iteration: u32,

    /// How many times each movement has been entered this run.
    pub movement_iteration: HashMap<String, u32>,

    /// Latest agent output per movement, consumed by `{previous_response}`
    /// and by parallel aggregation.
    pub movement_outputs: HashMap<String, String>,

    /// Private to this engine instance; never shared across runs.
    pub agent_sessions: HashMap<String, Session>,

    /// Accumulated user answers, newline-joined for `{user_inputs}`.
    pub user_inputs: Vec<String>,

    /// Content of the most recent agent response, regardless of which
    /// movement produced it. Surfaced in the task lifecycle's `report.md`.
    pub last_response: Option<String>,

    pub status: EngineStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Running,
    Blocked,
    Completed,
    Aborted,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            iteration: 0,
            movement_iteration: HashMap::new(),
            movement_outputs: HashMap::new(),
            agent_sessions: HashMap::new(),
            user_inputs: Vec::new(),
            last_response: None,
            status: EngineStatus::Running,
        }
    }

    pub fn enter_movement(&mut self, name: &str) {
        self.iteration += 1;
        *self.movement_iteration.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn movement_iteration_of(&self, name: &str) -> u32 {
        self.movement_iteration.get(name).copied().unwrap_or(0)
    }

    pub fn record_output(&mut self, movement: &str, content: impl Into<String>) {
        self.movement_outputs.insert(movement.to_string(), content.into());
    }

    pub fn previous_response_for(&self, movement: &str) -> Option<&str> {
        self.movement_outputs.get(movement).map(|s| s.as_str())
    }

    pub fn user_inputs_joined(&self) -> String {
        self.user_inputs.join("\n")
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EngineStatus::Completed | EngineStatus::Aborted)
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_increases_strictly_on_entry() {
        let mut state = EngineState::new();
        state.enter_movement("plan");
        state.enter_movement("implement");
        state.enter_movement("plan");
        assert_eq!(state.iteration, 3);
        assert_eq!(state.movement_iteration_of("plan"), 2);
        assert_eq!(state.movement_iteration_of("implement"), 1);
    }

    #[test]
    fn user_inputs_join_with_newlines() {
        let mut state = EngineState::new();
        state.user_inputs.push("first answer".to_string());
        state.user_inputs.push("second answer".to_string());
        assert_eq!(state.user_inputs_joined(), "first answer\nsecond answer");
    }
}
