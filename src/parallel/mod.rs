//! Parallel Runner — fans out a movement's `parallel`/`arpeggio`/
//! `team_leader` sub-movements concurrently and aggregates their results.
//!
//! Grounded on `loop/manager.rs`'s concurrent-task-spawning idiom
//! (`tokio::spawn` + join) and the event bus's per-execution `emitter_for`
//! pattern (`events/bus.rs`) generalized from "emit to a broadcast channel
//! keyed by execution id" to "emit to a broadcast channel keyed by run id,
//! with a sub-movement name prefix".

mod arpeggio;
mod fan_out;
mod prefixer;
mod team_leader;

pub use arpeggio::run_arpeggio;
pub use fan_out::{ParallelOutcome, SubOutcome, run_fan_out};
pub use prefixer::LinePrefixer;
pub use team_leader::run_team_leader;
