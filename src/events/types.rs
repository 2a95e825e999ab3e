use serde::{Deserialize, Serialize};

use crate::domain::{AgentResponse, EngineState};

/// Every event the Piece Engine emits during a run. Consumers must not
/// mutate the engine state carried in `WorkflowComplete`/`WorkflowAbort`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PieceEvent {
    MovementStart {
        run_id: String,
        movement: String,
        iteration: u32,
        instruction: String,
    },
    MovementComplete {
        run_id: String,
        movement: String,
        response: AgentResponse,
    },
    MovementBlocked {
        run_id: String,
        movement: String,
        response: AgentResponse,
    },
    MovementReport {
        run_id: String,
        movement: String,
        path: String,
        name: String,
    },
    MovementLoopDetected {
        run_id: String,
        movement: String,
        count: u32,
    },
    IterationLimit {
        run_id: String,
        current: u32,
        max: u32,
    },
    WorkflowComplete {
        run_id: String,
        state: EngineState,
    },
    WorkflowAbort {
        run_id: String,
        state: EngineState,
        reason: String,
    },
}

impl PieceEvent {
    pub fn run_id(&self) -> &str {
        match self {
            PieceEvent::MovementStart { run_id, .. }
            | PieceEvent::MovementComplete { run_id, .. }
            | PieceEvent::MovementBlocked { run_id, .. }
            | PieceEvent::MovementReport { run_id, .. }
            | PieceEvent::MovementLoopDetected { run_id, .. }
            | PieceEvent::IterationLimit { run_id, .. }
            | PieceEvent::WorkflowComplete { run_id, .. }
            | PieceEvent::WorkflowAbort { run_id, .. } => run_id,
        }
    }

    /// The last event of any run is always one of these two.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PieceEvent::WorkflowComplete { .. } | PieceEvent::WorkflowAbort { .. })
    }
}
