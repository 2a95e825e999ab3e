//! CLI surface — out of scope as a design component (the argv parser and
//! interactive prompt widgets are external collaborators), but the crate
//! ships a thin `clap`-derived binary entry point exposing the named
//! sub-commands as a harness for manual and integration testing.
//!
//! Grounded on `cli.rs`'s `Cli`/`Command` derive shape, trimmed down to the
//! sub-commands TAKT actually names rather than the teacher's daemon surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// TAKT - Piece Engine for orchestrating long-running AI coding agents
#[derive(Parser)]
#[command(name = "takt", about = "Piece engine for YAML-defined agent workflows", version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true, help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Task description (or `#N` GitHub issue reference), used when no
    /// sub-command is given — equivalent to `takt run <description>`.
    pub task: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Queue a task and run the Supervisor until it drains.
    Run {
        /// Task description or `#N` issue reference
        task: String,

        /// Piece to run (defaults to the project's default piece)
        #[arg(short, long)]
        piece: Option<String>,

        /// Run the task in a fresh worktree rather than the project root
        #[arg(long)]
        worktree: bool,
    },

    /// Run the Supervisor continuously, picking up tasks as they're queued.
    Watch,

    /// Queue a task without waiting for a run.
    Add {
        /// Task description or `#N` issue reference
        task: String,

        #[arg(short, long)]
        piece: Option<String>,
    },

    /// List queued, completed, and failed tasks.
    List {
        /// Filter by status (pending, completed, failed)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Switch the active repertoire package.
    Switch {
        /// Repertoire package name
        name: String,
    },

    /// Clear completed/failed task records.
    Clear {
        /// Also clear pending tasks
        #[arg(long)]
        all: bool,
    },

    /// Eject a builtin piece into the project directory for editing.
    Eject {
        /// Piece identifier
        piece: String,
    },

    /// Show the resolved configuration.
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_task_as_positional() {
        let cli = Cli::parse_from(["takt", "fix the login bug"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.task.as_deref(), Some("fix the login bug"));
    }

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::parse_from(["takt", "run", "fix the login bug", "--piece", "default"]);
        match cli.command {
            Some(Command::Run { task, piece, worktree }) => {
                assert_eq!(task, "fix the login bug");
                assert_eq!(piece.as_deref(), Some("default"));
                assert!(!worktree);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parses_watch_subcommand() {
        let cli = Cli::parse_from(["takt", "watch"]);
        assert!(matches!(cli.command, Some(Command::Watch)));
    }

    #[test]
    fn parses_config_with_explicit_path() {
        let cli = Cli::parse_from(["takt", "-c", "/path/to/config.yml", "config"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
        assert!(matches!(cli.command, Some(Command::Config)));
    }
}
