//! `AgentClient` — the external capability boundary for calling out to a
//! concrete agent provider. Grounded on the teacher's `LlmClient` trait
//! shape (`llm/client.rs`): an `async_trait`, a single blocking call plus a
//! streaming variant, a `#[cfg(test)]` mock that plays back canned
//! responses. TAKT's four concrete providers (claude/codex/opencode/mock
//! CLI wrappers) are external collaborators and out of scope here — only
//! the trait and a test double live in this crate.

mod client;
mod error;
mod mock;
mod retry;

pub use client::{AgentCallOptions, AgentClient, StreamEvent};
pub use error::AgentError;
pub use mock::MockAgentClient;
pub use retry::call_with_retry;
