use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::{VCSClient, WorktreeInfo};
use super::error::VcsError;

/// Records created/removed worktrees in memory without touching git or the
/// filesystem; used to exercise the Task Supervisor's hand-off points in
/// tests.
#[derive(Default)]
pub struct MockVcsClient {
    active: Mutex<HashSet<String>>,
    pub fail_push: bool,
}

impl MockVcsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_push() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
            fail_push: true,
        }
    }
}

#[async_trait]
impl VCSClient for MockVcsClient {
    async fn create_worktree(&self, task_id: &str, branch: Option<&str>) -> Result<WorktreeInfo, VcsError> {
        let mut active = self.active.lock().expect("mock vcs mutex poisoned");
        if !active.insert(task_id.to_string()) {
            return Err(VcsError::AlreadyExists(task_id.to_string()));
        }

        Ok(WorktreeInfo {
            path: PathBuf::from(format!("/tmp/takt-worktrees/{task_id}")),
            branch: branch.map(str::to_string).unwrap_or_else(|| format!("takt/{task_id}")),
        })
    }

    async fn remove_worktree(&self, task_id: &str) -> Result<(), VcsError> {
        let mut active = self.active.lock().expect("mock vcs mutex poisoned");
        if !active.remove(task_id) {
            return Err(VcsError::NotFound(task_id.to_string()));
        }
        Ok(())
    }

    async fn auto_commit_and_push(&self, _worktree: &WorktreeInfo, _message: &str) -> Result<(), VcsError> {
        if self.fail_push {
            return Err(VcsError::CommandFailed("mock push failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_remove_roundtrips() {
        let client = MockVcsClient::new();
        let info = client.create_worktree("fix-login", None).await.unwrap();
        assert_eq!(info.branch, "takt/fix-login");
        client.remove_worktree("fix-login").await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_create_errors() {
        let client = MockVcsClient::new();
        client.create_worktree("fix-login", None).await.unwrap();
        assert!(matches!(
            client.create_worktree("fix-login", None).await,
            Err(VcsError::AlreadyExists(_))
        ));
    }
}
