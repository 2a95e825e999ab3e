//! Domain types for TAKT
//!
//! Core data model shared by every component: the piece/movement/rule graph
//! loaded from YAML, the per-run engine state, and the on-disk task queue
//! entries. All wire-facing types derive `serde` with kebab-case field names
//! to match the YAML surface described in the piece/task schemas.

mod id;
mod piece;
mod response;
mod state;
mod task;

pub use id::{generate_run_dir_name, generate_slug, slugify};
pub use piece::{
    AggregateType, ArpeggioConfig, LoopMonitor, MergeStrategy, Movement, OutputContract, ParallelKind, PermissionMode,
    Piece, PieceConfig, Rule, RuntimeConfig, SessionDirective, TeamLeaderConfig, TERMINAL_ABORT, TERMINAL_COMPLETE,
    is_terminal_token,
};
pub use response::{AgentResponse, AgentStatus, RuleMatchMethod, Session, SessionMode};
pub use state::{EngineState, EngineStatus};
pub use task::{ClaimSet, RunRecord, RunStatus, Task};
