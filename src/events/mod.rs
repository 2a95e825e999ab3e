//! Piece Engine event bus — broadcast pub/sub plus a JSONL execution log.
//!
//! Grounded on the teacher's `events::{EventBus, EventEmitter}` (`events/
//! bus.rs`): a `tokio::sync::broadcast` channel, a cheap-to-clone emitter
//! bound to one run, fire-and-forget emission (no subscribers is fine).

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter};
pub use logger::{append_event, read_execution_log};
pub use types::PieceEvent;
