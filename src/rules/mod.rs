//! Rule Evaluator — tag-based → aggregate → textual → AI-judge → fallback.
//!
//! Grounded on `loop/validation.rs`'s shape (pure evaluator over a declared
//! list, report a structured result) generalized from shell-exit-code
//! evaluation to rule-condition evaluation, and on the "first matching case
//! wins" idiom used throughout the teacher's status-dispatch `match` blocks.

mod aggregate;
mod evaluator;
mod tag;

pub use aggregate::{matches as aggregate_matches, parse_aggregate};
pub use evaluator::{EvaluationInput, evaluate};
pub use tag::{TagError, compile_tag_pattern, extract_tag};
