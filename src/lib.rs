//! TAKT — a piece engine for orchestrating long-running AI coding agents
//! through YAML-defined workflows.
//!
//! # Modules
//!
//! - [`domain`] - Piece/Movement/Rule graph, engine state, task queue types
//! - [`config`] - layered configuration (defaults → global → project → env)
//! - [`piece`] - Piece Loader: 4-layer lookup, YAML parsing, validation
//! - [`facet`] - Facet Loader & Template: persona/policy/instruction resolution
//! - [`taskstore`] - the on-disk task queue under `.takt/{tasks,completed,failed}/`
//! - [`rules`] - Rule Evaluator: tag-based → aggregate → textual → AI-judge
//! - [`agent`] - `AgentClient` trait, the external capability boundary
//! - [`vcs`] - `VCSClient` trait, the git worktree capability boundary
//! - [`phase`] - Phase Runner: execute / report / judge within one movement
//! - [`movement`] - Movement Executor: one movement's full lifecycle
//! - [`parallel`] - Parallel Runner: `parallel`/`arpeggio`/`team_leader` fan-out
//! - [`engine`] - Piece Engine: the movement-to-movement state machine loop
//! - [`events`] - event bus and JSONL execution log
//! - [`supervisor`] - Task Supervisor: the worker pool that drives the queue
//! - [`cli`] - command-line interface
//! - [`cancel`] - cooperative cancellation token

pub mod agent;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod events;
pub mod facet;
pub mod movement;
pub mod parallel;
pub mod phase;
pub mod piece;
pub mod rules;
pub mod supervisor;
pub mod taskstore;
pub mod vcs;

pub use cancel::CancelToken;
pub use config::{Config, ResolvedConfig};
pub use domain::{AgentResponse, ClaimSet, EngineState, Movement, Piece, Rule, RunRecord, Task};
pub use engine::{EngineError, RunContext, run_piece};
pub use supervisor::{SupervisorConfig, SupervisorContext, SupervisorError, TaskSupervisor};
