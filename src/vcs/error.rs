use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("worktree for {0:?} already exists")]
    AlreadyExists(String),

    #[error("worktree for {0:?} not found")]
    NotFound(String),

    #[error("git command failed: {0}")]
    CommandFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
