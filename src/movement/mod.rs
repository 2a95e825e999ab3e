//! Movement Executor — single-movement orchestration: instruction build
//! (Facet Loader + Template) → Phase Runner invocation → quality gates →
//! rule evaluation → state update.
//!
//! Grounded on `loop/manager.rs`'s per-loop lifecycle orchestration (spawn,
//! track iteration, hand off to the engine), narrowed here to a single
//! movement rather than a whole loop's lifetime.

mod executor;
mod quality_gate;

pub use executor::{
    MovementContext, MovementError, MovementOutcome, execute_movement, execute_movement_from_text, existing_output_contracts,
};
pub use quality_gate::{QualityGateResult, run_all as run_quality_gates};
