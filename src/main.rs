//! TAKT - Piece Engine for orchestrating long-running AI coding agents
//!
//! CLI entry point: a thin harness over the Task Supervisor, grounded on
//! `main.rs`'s `setup_logging` + command-dispatch shape.
//!
//! The concrete `AgentClient`/`VCSClient` providers (claude/codex/opencode
//! CLI wrappers, real git plumbing) are external collaborators out of scope
//! for this crate, so this binary wires the mock implementations as its
//! capability providers. A real build swaps these two lines for whichever
//! provider the project's config selects.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use takt::agent::MockAgentClient;
use takt::cli::{Cli, Command};
use takt::config::Config;
use takt::domain::Task;
use takt::supervisor::{SupervisorConfig, SupervisorContext, SupervisorExit, TaskSupervisor};
use takt::taskstore::TaskStore;
use takt::vcs::MockVcsClient;

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("takt").join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let level = match cli_log_level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level {other:?}, defaulting to INFO");
            tracing::Level::INFO
        }
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("takt.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

/// Exit codes per the CLI collaborator contract: `0` success, `1`
/// task/pipe failure, `130` SIGINT (128 + SIGINT's signal number 2).
const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_SIGINT: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let resolved = config.resolve().context("Failed to resolve configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");

    let project_root = std::env::current_dir().context("Failed to read current directory")?;

    let outcome = match (cli.command, cli.task) {
        (Some(Command::Run { task, piece, worktree }), _) => cmd_run(&project_root, &resolved, task, piece, worktree).await,
        (Some(Command::Watch), _) => cmd_watch(&project_root, &resolved).await,
        (Some(Command::Add { task, piece }), _) => cmd_add(&project_root, task, piece, false).await.map(|()| EXIT_OK),
        (Some(Command::List { status }), _) => cmd_list(&project_root, status.as_deref()).await.map(|()| EXIT_OK),
        (Some(Command::Switch { name }), _) => cmd_switch(&name).await.map(|()| EXIT_OK),
        (Some(Command::Clear { all }), _) => cmd_clear(&project_root, all).await.map(|()| EXIT_OK),
        (Some(Command::Eject { piece }), _) => cmd_eject(&project_root, &piece).await.map(|()| EXIT_OK),
        (Some(Command::Config), _) => cmd_config(&resolved).map(|()| EXIT_OK),
        (None, Some(task)) => cmd_run(&project_root, &resolved, task, None, false).await,
        (None, None) => cmd_watch(&project_root, &resolved).await,
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn takt_dir(project_root: &std::path::Path) -> PathBuf {
    project_root.join(".takt")
}

async fn cmd_add(project_root: &std::path::Path, task: String, piece: Option<String>, worktree: bool) -> Result<()> {
    debug!(%task, ?piece, worktree, "cmd_add: called");
    let mut body = Task::new(task);
    body.piece = piece;
    body.worktree = worktree;

    let tasks_dir = takt_dir(project_root).join("tasks");
    fs::create_dir_all(&tasks_dir).context("Failed to create tasks directory")?;

    let slug = takt::domain::slugify(&body.task);
    let path = tasks_dir.join(format!("{slug}.yaml"));
    let yaml = serde_yaml::to_string(&body).context("Failed to serialize task")?;
    fs::write(&path, yaml).context("Failed to write task file")?;

    println!("Queued task: {}", path.display());
    Ok(())
}

async fn cmd_run(
    project_root: &std::path::Path,
    resolved: &takt::config::ResolvedConfig,
    task: String,
    piece: Option<String>,
    worktree: bool,
) -> Result<i32> {
    cmd_add(project_root, task, piece, worktree).await?;
    run_supervisor_once(project_root, resolved).await
}

async fn cmd_watch(project_root: &std::path::Path, resolved: &takt::config::ResolvedConfig) -> Result<i32> {
    info!("cmd_watch: starting Supervisor, press Ctrl+C to stop");
    let agent_client = MockAgentClient::new(Vec::new());
    let vcs_client = MockVcsClient::new();
    let task_store = TaskStore::spawn(takt_dir(project_root));
    let ctx = SupervisorContext::new(project_root, task_store, &agent_client, Some(&vcs_client))
        .with_ai_judge_enabled(resolved.ai_judge_enabled);
    let mut supervisor = TaskSupervisor::new(SupervisorConfig::from(resolved), &ctx);
    let exit = supervisor.run().await.context("Supervisor exited with an error")?;
    Ok(match exit {
        SupervisorExit::Interrupted => EXIT_SIGINT,
        SupervisorExit::Drained => EXIT_OK,
    })
}

async fn run_supervisor_once(project_root: &std::path::Path, resolved: &takt::config::ResolvedConfig) -> Result<i32> {
    let agent_client = MockAgentClient::new(Vec::new());
    let vcs_client = MockVcsClient::new();
    let task_store = TaskStore::spawn(takt_dir(project_root));
    let ctx = SupervisorContext::new(project_root, task_store, &agent_client, Some(&vcs_client))
        .with_ai_judge_enabled(resolved.ai_judge_enabled);
    let mut supervisor = TaskSupervisor::new(SupervisorConfig::from(resolved), &ctx);
    let any_failed = supervisor.run_until_drained().await.context("Supervisor exited with an error")?;
    Ok(if any_failed { EXIT_FAILURE } else { EXIT_OK })
}

async fn cmd_list(project_root: &std::path::Path, status: Option<&str>) -> Result<()> {
    debug!(?status, "cmd_list: called");
    let entries = takt::taskstore::list_tasks(&takt_dir(project_root)).context("Failed to list tasks")?;

    if entries.is_empty() {
        println!("No pending tasks.");
    }
    for entry in entries {
        println!("{}  {}", entry.file_name, entry.task.task);
    }
    Ok(())
}

async fn cmd_clear(project_root: &std::path::Path, all: bool) -> Result<()> {
    debug!(all, "cmd_clear: called");
    for name in ["completed", "failed"] {
        let dir = takt_dir(project_root).join(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("Failed to clear {name} directory"))?;
        }
    }
    if all {
        let dir = takt_dir(project_root).join("tasks");
        if dir.exists() {
            fs::remove_dir_all(&dir).context("Failed to clear tasks directory")?;
        }
    }
    println!("Cleared task records.");
    Ok(())
}

async fn cmd_eject(_project_root: &std::path::Path, piece: &str) -> Result<()> {
    debug!(piece, "cmd_eject: called");
    println!("No builtin piece named {piece:?} to eject (no builtin pieces ship yet, see DESIGN.md)");
    Ok(())
}

async fn cmd_switch(name: &str) -> Result<()> {
    debug!(name, "cmd_switch: called");
    println!("Repertoire switching is an external collaborator concern (see spec §1); nothing to do here for {name:?}");
    Ok(())
}

fn cmd_config(resolved: &takt::config::ResolvedConfig) -> Result<()> {
    println!("language: {:?}", resolved.language);
    println!("provider: {:?}", resolved.provider);
    println!("concurrency: {}", resolved.concurrency);
    println!("task_poll_interval_ms: {}", resolved.task_poll_interval_ms);
    println!("use_builtin_pieces: {}", resolved.use_builtin_pieces);
    Ok(())
}
