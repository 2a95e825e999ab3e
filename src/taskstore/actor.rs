//! `TaskStore` — an actor handle serializing access to the on-disk queue.
//!
//! Grounded on `StateManager`/`actor_loop`: an owned private path behind an
//! `mpsc::Sender<Command>`, each public method sending a command carrying a
//! `oneshot::Sender` for the reply, so concurrent Task Supervisor workers
//! never race on the same claim.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::domain::RunRecord;

use super::error::TaskStoreError;
use super::fs_ops::{self, TaskEntry};

type Reply<T> = oneshot::Sender<Result<T, TaskStoreError>>;

enum Command {
    List { reply: Reply<Vec<TaskEntry>> },
    ClaimNext { k: usize, reply: Reply<Vec<TaskEntry>> },
    Complete { file_name: String, record: RunRecord, reply: Reply<()> },
    Fail { file_name: String, record: RunRecord, reply: Reply<()> },
    Requeue {
        run_dir_name: String,
        start_movement: String,
        retry_note: String,
        reply: Reply<()>,
    },
}

#[derive(Clone)]
pub struct TaskStore {
    tx: mpsc::Sender<Command>,
}

impl TaskStore {
    pub fn spawn(takt_dir: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(actor_loop(takt_dir.into(), rx));
        Self { tx }
    }

    pub async fn list_tasks(&self) -> Result<Vec<TaskEntry>, TaskStoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::List { reply })
            .await
            .map_err(|_| TaskStoreError::ChannelClosed)?;
        rx.await.map_err(|_| TaskStoreError::ChannelClosed)?
    }

    pub async fn claim_next_tasks(&self, k: usize) -> Result<Vec<TaskEntry>, TaskStoreError> {
        debug!(k, "TaskStore::claim_next_tasks: called");
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::ClaimNext { k, reply })
            .await
            .map_err(|_| TaskStoreError::ChannelClosed)?;
        rx.await.map_err(|_| TaskStoreError::ChannelClosed)?
    }

    pub async fn complete_task(&self, file_name: impl Into<String>, record: RunRecord) -> Result<(), TaskStoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Complete {
                file_name: file_name.into(),
                record,
                reply,
            })
            .await
            .map_err(|_| TaskStoreError::ChannelClosed)?;
        rx.await.map_err(|_| TaskStoreError::ChannelClosed)?
    }

    pub async fn fail_task(&self, file_name: impl Into<String>, record: RunRecord) -> Result<(), TaskStoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Fail {
                file_name: file_name.into(),
                record,
                reply,
            })
            .await
            .map_err(|_| TaskStoreError::ChannelClosed)?;
        rx.await.map_err(|_| TaskStoreError::ChannelClosed)?
    }

    pub async fn requeue_failed_task(
        &self,
        run_dir_name: impl Into<String>,
        start_movement: impl Into<String>,
        retry_note: impl Into<String>,
    ) -> Result<(), TaskStoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Requeue {
                run_dir_name: run_dir_name.into(),
                start_movement: start_movement.into(),
                retry_note: retry_note.into(),
                reply,
            })
            .await
            .map_err(|_| TaskStoreError::ChannelClosed)?;
        rx.await.map_err(|_| TaskStoreError::ChannelClosed)?
    }
}

async fn actor_loop(takt_dir: PathBuf, mut rx: mpsc::Receiver<Command>) {
    debug!("taskstore actor_loop: started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::List { reply } => {
                let _ = reply.send(fs_ops::list_tasks(&takt_dir));
            }
            Command::ClaimNext { k, reply } => {
                let _ = reply.send(fs_ops::claim_next_tasks(&takt_dir, k));
            }
            Command::Complete { file_name, record, reply } => {
                let _ = reply.send(fs_ops::complete_task(&takt_dir, &file_name, &record));
            }
            Command::Fail { file_name, record, reply } => {
                let _ = reply.send(fs_ops::fail_task(&takt_dir, &file_name, &record));
            }
            Command::Requeue {
                run_dir_name,
                start_movement,
                retry_note,
                reply,
            } => {
                let _ = reply.send(fs_ops::requeue_failed_task(
                    &takt_dir,
                    &run_dir_name,
                    &start_movement,
                    &retry_note,
                ));
            }
        }
    }
}
