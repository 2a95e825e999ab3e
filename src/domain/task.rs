//! Task, ClaimSet, RunRecord — the on-disk queue entry and its lifecycle.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An on-disk unit of work under `.takt/tasks/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task: String,

    #[serde(default)]
    pub piece: Option<String>,

    #[serde(default)]
    pub worktree: bool,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub start_movement: Option<String>,

    #[serde(default)]
    pub retry_note: Option<String>,
}

impl Task {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            piece: None,
            worktree: false,
            branch: None,
            start_movement: None,
            retry_note: None,
        }
    }
}

/// In-memory set of task file names currently claimed by a supervisor.
/// Enforces mutual exclusion on claim → move transitions.
#[derive(Debug, Default)]
pub struct ClaimSet {
    claimed: HashSet<String>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the name was not already claimed.
    pub fn claim(&mut self, name: impl Into<String>) -> bool {
        self.claimed.insert(name.into())
    }

    pub fn release(&mut self, name: &str) {
        self.claimed.remove(name);
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }
}

/// The persisted artifact of one finished task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub task: String,
    pub piece: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub status: RunStatus,

    /// One entry per engine event, in emission order.
    pub execution_log: Vec<String>,

    /// Directory holding `log.json`, per-output-contract files, and any
    /// parallel-sub artifacts for this run.
    pub report_dir: PathBuf,

    /// Content of the final agent response, embedded verbatim in
    /// `report.md`.
    #[serde(default)]
    pub response: String,

    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_set_rejects_double_claim() {
        let mut claims = ClaimSet::new();
        assert!(claims.claim("fix-login.yaml"));
        assert!(!claims.claim("fix-login.yaml"));
        assert_eq!(claims.len(), 1);
        claims.release("fix-login.yaml");
        assert!(claims.is_empty());
    }
}
