use thiserror::Error;

use crate::domain::AgentResponse;

/// The joined result of running a movement's phase protocol: Phase 1's
/// response carries the session forward; Phase 3's content (if the
/// judgment phase ran) feeds the Rule Evaluator's tag-based step ahead of
/// Phase 1's own content.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub phase1: AgentResponse,
    pub phase3_tag_content: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("phase 1 returned blocked status with no UserInputCallback available")]
    BlockedWithoutCallback,

    #[error("phase 1 errored: {0}")]
    Phase1Error(String),

    #[error("phase 1 was interrupted")]
    Phase1Interrupted,

    #[error("phase 2 (report) errored: {0}")]
    Phase2Error(String),

    #[error("phase 3 (judge) errored: {0}")]
    Phase3Error(String),

    #[error(transparent)]
    Agent(#[from] crate::agent::AgentError),
}
