use std::path::PathBuf;

use async_trait::async_trait;

use super::error::VcsError;

#[derive(Debug, Clone)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub branch: String,
}

/// Invoked by the Task Supervisor at two hand-off points: before a
/// `worktree: true` task runs (to materialize a working directory) and
/// after a run completes (to auto-commit and push). Failure of the latter
/// is a non-fatal warning — see the Task Supervisor's error-handling note.
#[async_trait]
pub trait VCSClient: Send + Sync {
    async fn create_worktree(&self, task_id: &str, branch: Option<&str>) -> Result<WorktreeInfo, VcsError>;

    async fn remove_worktree(&self, task_id: &str) -> Result<(), VcsError>;

    async fn auto_commit_and_push(&self, worktree: &WorktreeInfo, message: &str) -> Result<(), VcsError>;
}
