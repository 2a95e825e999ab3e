use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::agent::AgentClient;
use crate::cancel::CancelToken;
use crate::domain::{
    AgentStatus, EngineState, EngineStatus, Piece, ParallelKind, TERMINAL_ABORT, TERMINAL_COMPLETE, is_terminal_token,
};
use crate::events::{EventEmitter, PieceEvent};
use crate::facet::FacetLoader;
use crate::movement::{self, MovementContext};
use crate::parallel::{run_arpeggio, run_fan_out, run_team_leader};

use super::loop_monitor::{LoopMonitorTracker, judge_cycle};

/// Structural piece errors that abort `run_piece` outright. Per-movement
/// failures (no rule match, blocked with no callback, phase/facet errors,
/// cancellation) are not represented here: they resolve the run to
/// `EngineStatus::Aborted` with a `workflow:abort` event instead, since the
/// piece author's own rules (e.g. an `ABORT` route) drive that path too.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("piece {0:?} names no movements")]
    EmptyPiece(String),

    #[error("movement {0:?} not found in piece {1:?}")]
    UnknownMovement(String, String),
}

pub struct RunContext<'a> {
    pub task: &'a str,
    pub cwd: &'a Path,
    pub report_dir: PathBuf,
    pub facet_loader: &'a FacetLoader,
    pub agent_client: &'a dyn AgentClient,
    pub emitter: EventEmitter,
    pub cancel: CancelToken,
    pub ai_judge_enabled: bool,
}

/// Drive a piece from its initial movement to a terminal state.
pub async fn run_piece(piece: &Piece, ctx: RunContext<'_>) -> Result<EngineState, EngineError> {
    let Some(mut current) = piece.initial_movement_name().map(str::to_string) else {
        return Err(EngineError::EmptyPiece(piece.name.clone()));
    };

    let mut state = EngineState::new();
    let mut monitor = LoopMonitorTracker::new();

    loop {
        if ctx.cancel.is_cancelled() {
            state.status = EngineStatus::Aborted;
            ctx.emitter.emit(PieceEvent::WorkflowAbort {
                run_id: ctx.emitter.run_id().to_string(),
                state: state.clone(),
                reason: "cancelled".to_string(),
            });
            info!(piece = %piece.name, movement = %current, "run_piece: cancelled before entering movement");
            return Ok(state);
        }

        if state.iteration >= piece.max_movements {
            ctx.emitter.emit(PieceEvent::IterationLimit {
                run_id: ctx.emitter.run_id().to_string(),
                current: state.iteration,
                max: piece.max_movements,
            });
            warn!(piece = %piece.name, "run_piece: iteration limit reached, no IterationLimitCallback available");
            state.status = EngineStatus::Aborted;
            ctx.emitter.emit(PieceEvent::WorkflowAbort {
                run_id: ctx.emitter.run_id().to_string(),
                state: state.clone(),
                reason: "iteration limit reached".to_string(),
            });
            return Ok(state);
        }

        monitor.record(&current);
        if let Some(loop_monitor) = monitor.detect(&piece.loop_monitors) {
            ctx.emitter.emit(PieceEvent::MovementLoopDetected {
                run_id: ctx.emitter.run_id().to_string(),
                movement: current.clone(),
                count: loop_monitor.threshold,
            });

            let accumulated = loop_monitor
                .cycle
                .iter()
                .filter_map(|name| state.movement_outputs.get(name).map(|content| format!("## {name}\n\n{content}")))
                .collect::<Vec<_>>()
                .join("\n\n---\n\n");

            let resolution = judge_cycle(loop_monitor, &accumulated, piece, ctx.facet_loader, ctx.agent_client, &ctx.cancel).await;

            match resolution {
                Some(next) if next == TERMINAL_COMPLETE => {
                    state.status = EngineStatus::Completed;
                    ctx.emitter.emit(PieceEvent::WorkflowComplete {
                        run_id: ctx.emitter.run_id().to_string(),
                        state: state.clone(),
                    });
                    info!(piece = %piece.name, "run_piece: loop monitor's judge selected COMPLETE");
                    return Ok(state);
                }
                Some(next) if next == TERMINAL_ABORT => {
                    state.status = EngineStatus::Aborted;
                    ctx.emitter.emit(PieceEvent::WorkflowAbort {
                        run_id: ctx.emitter.run_id().to_string(),
                        state: state.clone(),
                        reason: format!("loop monitor's judge selected ABORT for cycle {:?}", loop_monitor.cycle),
                    });
                    return Ok(state);
                }
                Some(next) => {
                    monitor.reset();
                    current = next;
                    continue;
                }
                None => {
                    warn!(cycle = ?loop_monitor.cycle, "run_piece: loop monitor's judge produced no resolution, aborting");
                    state.status = EngineStatus::Aborted;
                    ctx.emitter.emit(PieceEvent::WorkflowAbort {
                        run_id: ctx.emitter.run_id().to_string(),
                        state: state.clone(),
                        reason: format!("movement cycle {:?} repeated {} times with no judge resolution", loop_monitor.cycle, loop_monitor.threshold),
                    });
                    return Ok(state);
                }
            }
        }

        let Some(movement) = piece.movement(&current) else {
            return Err(EngineError::UnknownMovement(current.clone(), piece.name.clone()));
        };

        state.enter_movement(&current);
        let instruction_preview = movement.instruction.clone().unwrap_or_default();
        ctx.emitter.emit(PieceEvent::MovementStart {
            run_id: ctx.emitter.run_id().to_string(),
            movement: current.clone(),
            iteration: state.iteration,
            instruction: instruction_preview,
        });

        let (response, matched_rule_index, matched_rule_method, session, sub_all_failed) = match movement.parallel_kind() {
            Some(ParallelKind::Parallel(subs)) => {
                let outcome = run_fan_out(
                    movement,
                    subs,
                    piece,
                    ctx.facet_loader,
                    ctx.task,
                    state.iteration,
                    &ctx.report_dir,
                    ctx.cwd,
                    ctx.agent_client,
                    &ctx.cancel,
                    ctx.ai_judge_enabled,
                )
                .await;
                let response = movement::execute_movement_from_text(movement, &outcome.concatenated_content);
                (
                    response,
                    outcome.matched_rule_index,
                    outcome.matched_rule_method,
                    crate::domain::Session::fresh(current.clone()),
                    outcome.all_failed,
                )
            }
            Some(ParallelKind::Arpeggio(config)) => {
                let outcome = run_arpeggio(
                    movement,
                    config,
                    piece,
                    ctx.facet_loader,
                    ctx.task,
                    state.iteration,
                    &ctx.report_dir,
                    ctx.cwd,
                    ctx.agent_client,
                    &ctx.cancel,
                    ctx.ai_judge_enabled,
                )
                .await;
                let response = movement::execute_movement_from_text(movement, &outcome.concatenated_content);
                (
                    response,
                    outcome.matched_rule_index,
                    outcome.matched_rule_method,
                    crate::domain::Session::fresh(current.clone()),
                    outcome.all_failed,
                )
            }
            Some(ParallelKind::TeamLeader(config)) => {
                let outcome = match run_team_leader(
                    movement,
                    config,
                    piece,
                    ctx.facet_loader,
                    ctx.task,
                    state.iteration,
                    &ctx.report_dir,
                    ctx.cwd,
                    ctx.agent_client,
                    &ctx.cancel,
                    ctx.ai_judge_enabled,
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        state.status = EngineStatus::Aborted;
                        ctx.emitter.emit(PieceEvent::WorkflowAbort {
                            run_id: ctx.emitter.run_id().to_string(),
                            state: state.clone(),
                            reason: format!("movement {current:?} failed: {e}"),
                        });
                        return Ok(state);
                    }
                };
                let response = movement::execute_movement_from_text(movement, &outcome.concatenated_content);
                (
                    response,
                    outcome.matched_rule_index,
                    outcome.matched_rule_method,
                    crate::domain::Session::fresh(current.clone()),
                    outcome.all_failed,
                )
            }
            None => {
                let movement_ctx = MovementContext {
                    piece,
                    facet_loader: ctx.facet_loader,
                    task: ctx.task,
                    iteration: state.iteration,
                    movement_iteration: state.movement_iteration_of(&current),
                    previous_response: if movement.pass_previous_response {
                        state.previous_response_for(&current)
                    } else {
                        None
                    },
                    user_inputs: &state.user_inputs,
                    report_dir: &ctx.report_dir,
                    cwd: ctx.cwd,
                    prior_session: state.agent_sessions.get(&current).cloned(),
                    cancel: &ctx.cancel,
                    batch: None,
                    ai_judge_enabled: ctx.ai_judge_enabled,
                    on_stream: None,
                };

                let outcome = match movement::execute_movement(movement, movement_ctx, ctx.agent_client).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        state.status = EngineStatus::Aborted;
                        ctx.emitter.emit(PieceEvent::WorkflowAbort {
                            run_id: ctx.emitter.run_id().to_string(),
                            state: state.clone(),
                            reason: format!("movement {current:?} failed: {e}"),
                        });
                        return Ok(state);
                    }
                };

                state.agent_sessions.insert(current.clone(), outcome.session.clone());
                (
                    outcome.response,
                    outcome.matched_rule_index,
                    outcome.matched_rule_method,
                    outcome.session,
                    false,
                )
            }
        };

        let _ = session;
        let mut response = response;
        response.matched_rule_index = matched_rule_index;
        response.matched_rule_method = matched_rule_method;
        state.record_output(&current, response.content.clone());
        state.last_response = Some(response.content.clone());

        ctx.emitter.emit(PieceEvent::MovementComplete {
            run_id: ctx.emitter.run_id().to_string(),
            movement: current.clone(),
            response: response.clone(),
        });

        for path in movement::existing_output_contracts(movement, &ctx.report_dir) {
            ctx.emitter.emit(PieceEvent::MovementReport {
                run_id: ctx.emitter.run_id().to_string(),
                movement: current.clone(),
                path: path.display().to_string(),
                name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            });
        }

        if response.status == AgentStatus::Blocked {
            ctx.emitter.emit(PieceEvent::MovementBlocked {
                run_id: ctx.emitter.run_id().to_string(),
                movement: current.clone(),
                response: response.clone(),
            });
            warn!(movement = %current, "run_piece: blocked with no UserInputCallback available");
            state.status = EngineStatus::Aborted;
            ctx.emitter.emit(PieceEvent::WorkflowAbort {
                run_id: ctx.emitter.run_id().to_string(),
                state: state.clone(),
                reason: format!("movement {current:?} blocked with no user-input callback available"),
            });
            return Ok(state);
        }

        if response.status == AgentStatus::Interrupted {
            warn!(movement = %current, "run_piece: movement interrupted");
            state.status = EngineStatus::Aborted;
            ctx.emitter.emit(PieceEvent::WorkflowAbort {
                run_id: ctx.emitter.run_id().to_string(),
                state: state.clone(),
                reason: format!("movement {current:?} interrupted"),
            });
            return Ok(state);
        }

        if sub_all_failed {
            state.status = EngineStatus::Aborted;
            ctx.emitter.emit(PieceEvent::WorkflowAbort {
                run_id: ctx.emitter.run_id().to_string(),
                state: state.clone(),
                reason: format!("every sub-movement of {current:?} failed"),
            });
            return Ok(state);
        }

        let Some(rule_index) = matched_rule_index else {
            warn!(movement = %current, "run_piece: rule evaluator produced no match; aborting");
            state.status = EngineStatus::Aborted;
            ctx.emitter.emit(PieceEvent::WorkflowAbort {
                run_id: ctx.emitter.run_id().to_string(),
                state: state.clone(),
                reason: format!("rule evaluator produced no match in movement {current:?}"),
            });
            return Ok(state);
        };

        let next = movement
            .rules
            .get(rule_index)
            .and_then(|r| r.next.as_deref())
            .unwrap_or(TERMINAL_ABORT);

        if next == TERMINAL_COMPLETE {
            state.status = EngineStatus::Completed;
            ctx.emitter.emit(PieceEvent::WorkflowComplete {
                run_id: ctx.emitter.run_id().to_string(),
                state: state.clone(),
            });
            info!(piece = %piece.name, "run_piece: completed");
            return Ok(state);
        }
        if next == TERMINAL_ABORT {
            state.status = EngineStatus::Aborted;
            ctx.emitter.emit(PieceEvent::WorkflowAbort {
                run_id: ctx.emitter.run_id().to_string(),
                state: state.clone(),
                reason: format!("movement {current:?} selected ABORT"),
            });
            return Ok(state);
        }
        if is_terminal_token(next) {
            unreachable!("is_terminal_token only recognizes COMPLETE/ABORT, both handled above");
        }

        current = next.to_string();
    }
}
