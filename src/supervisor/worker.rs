//! Task Supervisor — claims tasks from the Task Store and dispatches them
//! through the Piece Engine, bounded to a configurable worker pool.
//!
//! Grounded on `scheduler/core.rs`'s concurrency-limited draining loop
//! (there: priority queue + rate window; here: claim-then-dispatch against
//! the file-based task queue) and `loop/manager.rs::LoopManager` (task
//! registry keyed by exec id, `reap_completed_tasks`, graceful-then-forced
//! shutdown). SIGINT handling follows `td/src/main.rs::run_daemon`'s
//! `tokio::signal::unix` select loop.
//!
//! In-flight runs are driven as same-task futures in a `FuturesUnordered`
//! rather than `tokio::spawn`'d, for the same reason the Parallel Runner
//! avoids `tokio::spawn`: the engine borrows `&dyn AgentClient`/`&dyn
//! VCSClient` rather than requiring `Arc`-wrapped `'static` owners. The
//! read-only collaborators live in `SupervisorContext`, borrowed for the
//! supervisor's whole lifetime, so in-flight futures never conflict with
//! the `&mut self` needed to update the claim set between polls.

use std::path::{Path, PathBuf};

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::agent::AgentClient;
use crate::cancel::CancelToken;
use crate::domain::{ClaimSet, RunRecord, RunStatus, Task, generate_slug};
use crate::engine::{RunContext, run_piece};
use crate::events::{EventBus, append_event};
use crate::facet::FacetLoader;
use crate::piece::PieceLoader;
use crate::taskstore::TaskStore;
use crate::vcs::VCSClient;

use super::error::SupervisorError;

const DEFAULT_PIECE: &str = "default";

#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    pub concurrency: u32,
    pub task_poll_interval_ms: u64,
}

impl From<&crate::config::ResolvedConfig> for SupervisorConfig {
    fn from(resolved: &crate::config::ResolvedConfig) -> Self {
        Self {
            concurrency: resolved.concurrency,
            task_poll_interval_ms: resolved.task_poll_interval_ms,
        }
    }
}

/// The read-only collaborators a dispatched run needs. Held by reference
/// from `TaskSupervisor` so in-flight futures never borrow `&mut self`.
pub struct SupervisorContext<'a> {
    pub project_root: PathBuf,
    pub task_store: TaskStore,
    pub piece_loader: PieceLoader,
    pub facet_loader: FacetLoader,
    pub agent_client: &'a dyn AgentClient,
    pub vcs_client: Option<&'a dyn VCSClient>,
    pub ai_judge_enabled: bool,
}

impl<'a> SupervisorContext<'a> {
    pub fn new(
        project_root: impl Into<PathBuf>,
        task_store: TaskStore,
        agent_client: &'a dyn AgentClient,
        vcs_client: Option<&'a dyn VCSClient>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            piece_loader: PieceLoader::new(&project_root),
            facet_loader: FacetLoader::new(&project_root),
            project_root,
            task_store,
            agent_client,
            vcs_client,
            ai_judge_enabled: false,
        }
    }

    /// Carry `ResolvedConfig::ai_judge_enabled` into the context built by
    /// [`SupervisorContext::new`], which predates the toggle and defaults
    /// it off.
    pub fn with_ai_judge_enabled(mut self, ai_judge_enabled: bool) -> Self {
        self.ai_judge_enabled = ai_judge_enabled;
        self
    }
}

/// Why `TaskSupervisor::run` returned, so the CLI harness can map it to the
/// right process exit code (spec'd as `0`/`130` for the `watch` surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    Drained,
    Interrupted,
}

/// Outcome of one dispatched task, reported back to the polling loop once
/// its future resolves.
struct TaskOutcome {
    file_name: String,
    cwd: PathBuf,
    branch: Option<String>,
    record: Result<RunRecord, SupervisorError>,
}

type RunFuture<'a> = std::pin::Pin<Box<dyn std::future::Future<Output = TaskOutcome> + 'a>>;

pub struct TaskSupervisor<'a> {
    config: SupervisorConfig,
    ctx: &'a SupervisorContext<'a>,
    claimed: ClaimSet,
    cancel: CancelToken,
}

impl<'a> TaskSupervisor<'a> {
    pub fn new(config: SupervisorConfig, ctx: &'a SupervisorContext<'a>) -> Self {
        Self {
            config,
            ctx,
            claimed: ClaimSet::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Claim and run tasks until the queue and in-flight set are both
    /// empty, then return whether any run failed (so the CLI harness can
    /// map it to exit code `1`). Used for one-shot invocations (`takt run`)
    /// rather than the long-lived `run` loop, which only exits on SIGINT.
    pub async fn run_until_drained(&mut self) -> Result<bool, SupervisorError> {
        let poll_interval = std::time::Duration::from_millis(self.config.task_poll_interval_ms.clamp(100, 5000));
        let mut in_flight: FuturesUnordered<RunFuture<'a>> = FuturesUnordered::new();
        let mut any_failed = false;

        loop {
            self.poll_and_dispatch(&mut in_flight).await;

            if in_flight.is_empty() {
                let remaining = self.ctx.task_store.list_tasks().await?;
                if remaining.is_empty() {
                    return Ok(any_failed);
                }
                tokio::time::sleep(poll_interval).await;
                continue;
            }

            if let Some(outcome) = in_flight.next().await {
                any_failed |= !matches!(outcome.record, Ok(ref r) if r.status == RunStatus::Completed);
                self.finish(outcome).await;
            }
        }
    }

    /// Drive the worker pool until a graceful drain completes or a second
    /// SIGINT forces an abort of whatever is still in flight.
    pub async fn run(&mut self) -> Result<SupervisorExit, SupervisorError> {
        let poll_interval = std::time::Duration::from_millis(self.config.task_poll_interval_ms.clamp(100, 5000));
        let mut interval = tokio::time::interval(poll_interval);
        let mut in_flight: FuturesUnordered<RunFuture<'a>> = FuturesUnordered::new();
        let mut draining = false;

        #[cfg(unix)]
        let mut sigint = {
            use tokio::signal::unix::{SignalKind, signal};
            signal(SignalKind::interrupt())?
        };

        loop {
            #[cfg(unix)]
            {
                tokio::select! {
                    _ = interval.tick() => {
                        if !draining {
                            self.poll_and_dispatch(&mut in_flight).await;
                        }
                    }
                    Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                        self.finish(outcome).await;
                    }
                    _ = sigint.recv() => {
                        if self.handle_sigint(&mut draining, in_flight.len()) {
                            self.cancel.cancel();
                            drop(in_flight);
                            return Ok(SupervisorExit::Interrupted);
                        }
                    }
                }
            }

            #[cfg(not(unix))]
            {
                tokio::select! {
                    _ = interval.tick() => {
                        if !draining {
                            self.poll_and_dispatch(&mut in_flight).await;
                        }
                    }
                    Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                        self.finish(outcome).await;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        if self.handle_sigint(&mut draining, in_flight.len()) {
                            self.cancel.cancel();
                            drop(in_flight);
                            return Ok(SupervisorExit::Interrupted);
                        }
                    }
                }
            }

            if draining && in_flight.is_empty() {
                info!("TaskSupervisor::run: drain complete, no in-flight runs remain");
                return Ok(SupervisorExit::Interrupted);
            }
        }
    }

    /// Returns `true` when this is the second SIGINT and the caller should
    /// force-abort whatever is still in flight.
    fn handle_sigint(&self, draining: &mut bool, in_flight_count: usize) -> bool {
        if !*draining {
            *draining = true;
            warn!(in_flight = in_flight_count, "TaskSupervisor::run: SIGINT received, draining (no new claims)");
            false
        } else {
            warn!(in_flight = in_flight_count, "TaskSupervisor::run: second SIGINT, aborting in-flight runs");
            true
        }
    }

    async fn poll_and_dispatch(&mut self, in_flight: &mut FuturesUnordered<RunFuture<'a>>) {
        let free = self.config.concurrency.saturating_sub(in_flight.len() as u32) as usize;
        if free == 0 {
            return;
        }

        // `claim_next_tasks` is a plain list-and-truncate over `tasks/`; it does
        // not remove or mark the files it returns, so a task already dispatched
        // by an earlier tick still shows up here until it moves to completed/
        // or failed/. Over-fetch by the number we're already tracking and let
        // `claimed` filter the overlap back out.
        let fetch = free + self.claimed.len();
        let entries = match self.ctx.task_store.claim_next_tasks(fetch).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "poll_and_dispatch: claim_next_tasks failed");
                return;
            }
        };

        let mut dispatched = 0;
        for entry in entries {
            if dispatched >= free {
                break;
            }
            if !self.claimed.claim(entry.file_name.clone()) {
                continue;
            }
            dispatched += 1;
            in_flight.push(Box::pin(dispatch_one(self.ctx, self.cancel.clone(), entry.file_name, entry.task)));
        }
    }

    async fn finish(&mut self, outcome: TaskOutcome) {
        self.claimed.release(&outcome.file_name);

        let record = match outcome.record {
            Ok(record) => record,
            Err(err) => {
                warn!(file_name = %outcome.file_name, error = %err, "TaskSupervisor::finish: run failed before producing a record");
                RunRecord {
                    task: outcome.file_name.clone(),
                    piece: DEFAULT_PIECE.to_string(),
                    started_at: chrono::Utc::now(),
                    completed_at: chrono::Utc::now(),
                    status: RunStatus::Failed,
                    execution_log: Vec::new(),
                    report_dir: self.ctx.project_root.join(".takt").join("reports"),
                    response: String::new(),
                    error: Some(err.to_string()),
                }
            }
        };

        let store_result = match record.status {
            RunStatus::Completed => {
                if let (Some(vcs), Some(branch)) = (self.ctx.vcs_client, &outcome.branch) {
                    let info = crate::vcs::WorktreeInfo {
                        path: outcome.cwd.clone(),
                        branch: branch.clone(),
                    };
                    if let Err(e) = vcs.auto_commit_and_push(&info, &format!("takt: {}", record.task)).await {
                        warn!(file_name = %outcome.file_name, error = %e, "TaskSupervisor::finish: auto_commit_and_push failed, non-fatal");
                    }
                }
                self.ctx.task_store.complete_task(outcome.file_name.as_str(), record).await
            }
            RunStatus::Failed => self.ctx.task_store.fail_task(outcome.file_name.as_str(), record).await,
        };

        if let Err(e) = store_result {
            warn!(file_name = %outcome.file_name, error = %e, "TaskSupervisor::finish: task store update failed");
        }
    }
}

async fn dispatch_one(ctx: &SupervisorContext<'_>, cancel: CancelToken, file_name: String, task: Task) -> TaskOutcome {
    debug!(file_name, task = %task.task, "dispatch_one: called");

    let started_at = chrono::Utc::now();
    let (cwd, branch) = match resolve_cwd(ctx, &file_name, &task).await {
        Ok(pair) => pair,
        Err(err) => {
            return TaskOutcome {
                file_name,
                cwd: ctx.project_root.clone(),
                branch: None,
                record: Err(err),
            };
        }
    };

    let record = run_one(ctx, cancel, &task, &cwd, started_at).await;
    TaskOutcome {
        file_name,
        cwd,
        branch,
        record,
    }
}

async fn resolve_cwd(
    ctx: &SupervisorContext<'_>,
    task_id: &str,
    task: &Task,
) -> Result<(PathBuf, Option<String>), SupervisorError> {
    if !task.worktree {
        return Ok((ctx.project_root.clone(), None));
    }

    let Some(vcs) = ctx.vcs_client else {
        warn!(task_id, "resolve_cwd: worktree requested but no VCSClient configured, using project root");
        return Ok((ctx.project_root.clone(), None));
    };

    let info = vcs
        .create_worktree(task_id, task.branch.as_deref())
        .await
        .map_err(|e| SupervisorError::Worktree(task_id.to_string(), e))?;
    Ok((info.path, Some(info.branch)))
}

async fn run_one(
    ctx: &SupervisorContext<'_>,
    cancel: CancelToken,
    task: &Task,
    cwd: &Path,
    started_at: chrono::DateTime<chrono::Utc>,
) -> Result<RunRecord, SupervisorError> {
    let piece_id = task.piece.as_deref().unwrap_or(DEFAULT_PIECE);
    let piece = ctx
        .piece_loader
        .load(piece_id)
        .map_err(|e| SupervisorError::PieceResolution(piece_id.to_string(), e))?;

    let report_dir = ctx.project_root.join(".takt").join("reports").join(generate_slug(&task.task, started_at));
    std::fs::create_dir_all(&report_dir).map_err(|e| SupervisorError::ReportWrite {
        path: report_dir.display().to_string(),
        source: e,
    })?;

    // A private event bus scoped to this one run: nothing else publishes to
    // it, so draining it with `try_recv` after the run finishes can't race
    // another run's events or overflow the broadcast buffer.
    let bus = EventBus::new(256);
    let mut rx = bus.subscribe();
    let run_id = uuid::Uuid::now_v7().to_string();
    let emitter = bus.emitter_for(run_id.clone());

    let run_ctx = RunContext {
        task: &task.task,
        cwd,
        report_dir: report_dir.clone(),
        facet_loader: &ctx.facet_loader,
        agent_client: ctx.agent_client,
        emitter,
        cancel,
        ai_judge_enabled: ctx.ai_judge_enabled,
    };

    let run_result = run_piece(&piece, run_ctx).await;

    let mut execution_log = Vec::new();
    let log_path = report_dir.join("log.json");
    while let Ok(event) = rx.try_recv() {
        let _ = append_event(&log_path, &event);
        if let Ok(line) = serde_json::to_string(&event) {
            execution_log.push(line);
        }
    }

    let state = run_result?;
    let completed_at = chrono::Utc::now();
    let status = match state.status {
        crate::domain::EngineStatus::Completed => RunStatus::Completed,
        _ => RunStatus::Failed,
    };

    Ok(RunRecord {
        task: task.task.clone(),
        piece: piece_id.to_string(),
        started_at,
        completed_at,
        status,
        execution_log,
        report_dir,
        response: state.last_response.clone().unwrap_or_default(),
        error: (status == RunStatus::Failed).then(|| format!("engine finished with status {:?}", state.status)),
    })
}
