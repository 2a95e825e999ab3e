//! Phase Runner — drives Phase 1 (execute) / Phase 2 (report) / Phase 3
//! (judge) of a single movement against one conversational session.
//!
//! Grounded on `loop/engine.rs::LoopEngine`'s iteration shape (build prompt
//! → call agent → inspect response → validate/report → decide
//! continue-or-stop), generalized from "one iteration of one loop type" to
//! "one phase of one movement".

mod runner;
mod types;

pub use runner::{placeholder_response, result_event, run_phases};
pub use types::{PhaseError, PhaseOutcome};
