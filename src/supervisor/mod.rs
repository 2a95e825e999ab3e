//! Task Supervisor — the worker pool that claims tasks from the Task Store
//! and drives each through the Piece Engine.

mod error;
mod worker;

pub use error::SupervisorError;
pub use worker::{SupervisorConfig, SupervisorContext, SupervisorExit, TaskSupervisor};
