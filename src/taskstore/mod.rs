//! Task Store — the on-disk queue under `.takt/{tasks,completed,failed}/`.
//!
//! No generic SQLite-backed `Record`/`Store` abstraction is used here (see
//! DESIGN.md); operations are direct typed filesystem actions, serialized
//! through an actor-over-channel handle in the shape of the teacher's
//! `StateManager`/`actor_loop`.

mod actor;
mod error;
mod fs_ops;

pub use actor::TaskStore;
pub use error::TaskStoreError;
pub use fs_ops::{TaskEntry, claim_next_tasks, complete_task, fail_task, list_tasks, requeue_failed_task};
