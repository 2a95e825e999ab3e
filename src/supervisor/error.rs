use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    TaskStore(#[from] crate::taskstore::TaskStoreError),

    #[error("piece {0:?} could not be resolved: {1}")]
    PieceResolution(String, crate::piece::PieceResolutionError),

    #[error("failed to create worktree for task {0:?}: {1}")]
    Worktree(String, crate::vcs::VcsError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),

    #[error("failed to write report artifact {path}: {source}")]
    ReportWrite { path: String, source: std::io::Error },

    #[error(transparent)]
    Engine(#[from] crate::engine::EngineError),
}
