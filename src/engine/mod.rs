//! Piece Engine — the single-threaded state-machine loop tying the Rule
//! Evaluator, Movement Executor, and Parallel Runner together.
//!
//! Grounded on `loop/engine.rs::LoopEngine`'s iterate-until-terminal shape
//! and `coordinator/core.rs`'s actor-mediated event broadcast, generalized
//! from "one loop type's fixed iteration" to "a piece's movement graph".

mod loop_monitor;
mod run;

pub use loop_monitor::LoopMonitorTracker;
pub use run::{EngineError, RunContext, run_piece};
