use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("io error at {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse task file {path}: {source}")]
    Yaml { path: String, source: serde_yaml::Error },

    #[error("task {0:?} is not currently claimed")]
    NotClaimed(String),

    #[error("completeTask called with success=false for {0:?}; use failTask instead")]
    CompleteCalledOnFailure(String),

    #[error("task store actor channel closed")]
    ChannelClosed,
}
