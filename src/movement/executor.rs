use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::agent::{AgentCallOptions, AgentClient, StreamEvent};
use crate::cancel::CancelToken;
use crate::domain::{AgentResponse, Movement, Piece, RuleMatchMethod, Session, SessionDirective};
use crate::facet::{FacetKind, FacetLoader, TemplateContext, render};
use crate::phase::{PhaseError, run_phases};
use crate::rules::{EvaluationInput, evaluate};

use super::quality_gate::{QualityGateResult, run_all};

#[derive(Debug, Error)]
pub enum MovementError {
    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("facet resolution failed: {0}")]
    Facet(#[from] crate::facet::FacetError),
}

pub struct MovementOutcome {
    pub response: AgentResponse,
    pub matched_rule_index: Option<usize>,
    pub matched_rule_method: Option<RuleMatchMethod>,
    pub session: Session,
    pub quality_gate_results: Vec<QualityGateResult>,
}

/// Everything `execute_movement` needs from the enclosing run that isn't
/// movement-local: the piece's facet maps, the current template variables,
/// and the session carried over from a prior entry of this movement.
pub struct MovementContext<'a> {
    pub piece: &'a Piece,
    pub facet_loader: &'a FacetLoader,
    pub task: &'a str,
    pub iteration: u32,
    pub movement_iteration: u32,
    pub previous_response: Option<&'a str>,
    pub user_inputs: &'a [String],
    pub report_dir: &'a Path,
    pub cwd: &'a Path,
    pub prior_session: Option<Session>,
    pub cancel: &'a CancelToken,

    /// Set only when this is an arpeggio batch movement: the batch's CSV
    /// rows, available in the instruction template as `{batch}`.
    pub batch: Option<&'a str>,

    /// `ResolvedConfig::ai_judge_enabled` (spec.md §4.4 step 4). When the
    /// first three cascade steps produce no match, this movement's rules
    /// get one more chance via an AI-judge call rather than aborting.
    pub ai_judge_enabled: bool,

    /// Set only when this movement is a Parallel Runner sub-movement: the
    /// channel its phase calls stream through so the parent can multiplex
    /// interleaved, `[name]`-prefixed output (§4.7). `None` for a
    /// top-level movement, which has no sibling to interleave with.
    pub on_stream: Option<mpsc::Sender<StreamEvent>>,
}

pub async fn execute_movement(
    movement: &Movement,
    ctx: MovementContext<'_>,
    agent_client: &dyn AgentClient,
) -> Result<MovementOutcome, MovementError> {
    debug!(movement = %movement.name, "execute_movement: called");

    let persona_text = ctx.facet_loader.resolve(FacetKind::Persona, &movement.persona, &ctx.piece.personas)?;

    let mut instruction_parts = vec![persona_text.clone()];
    if let Some(policy_key) = &movement.policy {
        instruction_parts.push(ctx.facet_loader.resolve(FacetKind::Policy, policy_key, &ctx.piece.policies)?);
    }
    if let Some(knowledge_key) = &movement.knowledge {
        instruction_parts.push(ctx.facet_loader.resolve(FacetKind::Knowledge, knowledge_key, &ctx.piece.knowledge)?);
    }

    let raw_template = match (&movement.instruction_template, &movement.instruction) {
        (Some(template), _) => template.clone(),
        (None, Some(inline)) => inline.clone(),
        (None, None) => String::new(),
    };
    instruction_parts.push(raw_template);

    let reports = scan_existing_reports(ctx.report_dir);
    let template_ctx = TemplateContext {
        task: ctx.task.to_string(),
        iteration: ctx.iteration,
        max_movements: ctx.piece.max_movements,
        movement_iteration: ctx.movement_iteration,
        previous_response: ctx.previous_response.map(str::to_string),
        user_inputs: ctx.user_inputs.to_vec(),
        report_dir: ctx.report_dir.to_path_buf(),
        cwd: ctx.cwd.to_path_buf(),
        reports,
        batch: ctx.batch.map(str::to_string),
    };
    let instruction = render(&instruction_parts.join("\n\n"), &template_ctx);

    let session_id = if movement.session == SessionDirective::Refresh {
        None
    } else {
        ctx.prior_session.as_ref().and_then(|s| s.provider_session_id.clone())
    };

    let outcome = run_phases(
        movement,
        ctx.piece,
        ctx.facet_loader,
        &persona_text,
        &instruction,
        session_id,
        agent_client,
        ctx.cancel,
        ctx.on_stream.clone(),
    )
    .await?;

    let quality_gate_results = run_all(&movement.quality_gates, ctx.cwd).await;

    let cascade_result = evaluate(EvaluationInput {
        movement,
        phase1_content: &outcome.phase1.content,
        phase3_tag_content: outcome.phase3_tag_content.as_deref(),
        sub_matched_conditions: &[],
        ai_judge_tag: None,
    });

    let (matched_rule_index, matched_rule_method) = match cascade_result {
        Some((i, m)) => (Some(i), Some(m)),
        None if ctx.ai_judge_enabled => {
            judge_unmatched_rule(movement, &persona_text, &outcome.phase1.content, agent_client, ctx.cancel)
                .await
                .map(|(i, m)| (Some(i), Some(m)))
                .unwrap_or((None, None))
        }
        None => (None, None),
    };

    let mut response = outcome.phase1;
    response.matched_rule_index = matched_rule_index;
    response.matched_rule_method = matched_rule_method;

    let session = match outcome.session_id {
        Some(id) => Session::continued(movement.name.clone(), id),
        None => Session::fresh(movement.name.clone()),
    };

    Ok(MovementOutcome {
        response,
        matched_rule_index,
        matched_rule_method,
        session,
        quality_gate_results,
    })
}

/// Last-resort rule match (spec.md §4.4 step 4): asks the movement's own
/// persona to pick the best-fitting rule by index out of its declared
/// list, rather than aborting the run outright. Only called when the
/// tag/aggregate/textual cascade produced no match and
/// `ResolvedConfig::ai_judge_enabled` is set.
async fn judge_unmatched_rule(
    movement: &Movement,
    persona_text: &str,
    content: &str,
    agent_client: &dyn AgentClient,
    cancel: &CancelToken,
) -> Option<(usize, RuleMatchMethod)> {
    if movement.rules.is_empty() || cancel.is_cancelled() {
        return None;
    }

    let candidates: String = movement
        .rules
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{i}: {}", rule.condition))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "The following response did not clearly match any rule by tag, aggregate, or text. \
         Pick the single best-matching rule by index and respond with exactly one line: \
         `[JUDGE:<index>]`. If none fit, respond `[JUDGE:-1]`.\n\nResponse:\n{content}\n\nRules:\n{candidates}"
    );

    let judged = agent_client
        .call(
            persona_text,
            &prompt,
            AgentCallOptions {
                allowed_tools: Vec::new(),
                max_turns: Some(1),
                abort_signal: Some(cancel.clone()),
                ..Default::default()
            },
        )
        .await
        .ok()?;

    let digits: String = judged
        .content
        .split("JUDGE:")
        .nth(1)?
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    let index: i64 = digits.parse().ok()?;

    if index < 0 {
        return None;
    }
    let index = index as usize;
    if index >= movement.rules.len() {
        return None;
    }
    Some((index, RuleMatchMethod::AiJudge))
}

fn scan_existing_reports(report_dir: &Path) -> HashMap<String, String> {
    let mut reports = HashMap::new();
    let Ok(entries) = std::fs::read_dir(report_dir) else {
        return reports;
    };

    for entry in entries.flatten() {
        if let Ok(name) = entry.file_name().into_string()
            && let Ok(content) = std::fs::read_to_string(entry.path())
        {
            reports.insert(name, content);
        }
    }
    reports
}

/// Wrap a Parallel Runner's concatenated sub-movement output as the
/// parent movement's own `AgentResponse`, so the engine can treat a
/// fan-out movement uniformly with a single-agent one.
pub fn execute_movement_from_text(movement: &Movement, content: &str) -> AgentResponse {
    crate::phase::placeholder_response(&movement.persona, content)
}

/// Expected report files for a movement that exist on disk in the run's
/// report directory, in declaration order — used by the Piece Engine to
/// emit `movement:report` events.
pub fn existing_output_contracts(movement: &Movement, report_dir: &Path) -> Vec<PathBuf> {
    movement
        .output_contracts
        .iter()
        .map(|contract| report_dir.join(contract.file_name()))
        .filter(|path| path.exists())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockAgentClient;
    use crate::phase::placeholder_response;
    use tempfile::tempdir;

    fn sample_piece() -> Piece {
        serde_yaml::from_str(
            r#"
name: sample
movements:
  - name: plan
    persona: planner
    rules:
      - condition: "clear"
        next: COMPLETE
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn builds_instruction_and_evaluates_rule() {
        let piece = sample_piece();
        let movement = &piece.movements[0];
        let report_dir = tempdir().unwrap();
        let facet_loader = FacetLoader::new(tempdir().unwrap().path());
        let client = MockAgentClient::new(vec![placeholder_response("planner", "looks clear to me")]);

        let ctx = MovementContext {
            piece: &piece,
            facet_loader: &facet_loader,
            task: "fix the bug",
            iteration: 1,
            movement_iteration: 1,
            previous_response: None,
            user_inputs: &[],
            report_dir: report_dir.path(),
            cwd: report_dir.path(),
            prior_session: None,
            cancel: &CancelToken::new(),
            batch: None,
            ai_judge_enabled: false,
            on_stream: None,
        };

        let outcome = execute_movement(movement, ctx, &client).await.unwrap();
        assert_eq!(outcome.matched_rule_index, Some(0));
        assert_eq!(outcome.matched_rule_method, Some(RuleMatchMethod::Textual));
    }

    #[tokio::test]
    async fn ai_judge_picks_a_rule_when_cascade_finds_nothing_and_toggle_is_on() {
        let piece = sample_piece();
        let movement = &piece.movements[0];
        let report_dir = tempdir().unwrap();
        let facet_loader = FacetLoader::new(tempdir().unwrap().path());
        let client = MockAgentClient::new(vec![
            placeholder_response("planner", "ambiguous output matching nothing"),
            placeholder_response("planner", "[JUDGE:0]"),
        ]);

        let ctx = MovementContext {
            piece: &piece,
            facet_loader: &facet_loader,
            task: "fix the bug",
            iteration: 1,
            movement_iteration: 1,
            previous_response: None,
            user_inputs: &[],
            report_dir: report_dir.path(),
            cwd: report_dir.path(),
            prior_session: None,
            cancel: &CancelToken::new(),
            batch: None,
            ai_judge_enabled: true,
            on_stream: None,
        };

        let outcome = execute_movement(movement, ctx, &client).await.unwrap();
        assert_eq!(outcome.matched_rule_index, Some(0));
        assert_eq!(outcome.matched_rule_method, Some(RuleMatchMethod::AiJudge));
    }

    #[tokio::test]
    async fn ai_judge_disabled_leaves_unmatched_output_unmatched() {
        let piece = sample_piece();
        let movement = &piece.movements[0];
        let report_dir = tempdir().unwrap();
        let facet_loader = FacetLoader::new(tempdir().unwrap().path());
        let client = MockAgentClient::new(vec![placeholder_response("planner", "ambiguous output matching nothing")]);

        let ctx = MovementContext {
            piece: &piece,
            facet_loader: &facet_loader,
            task: "fix the bug",
            iteration: 1,
            movement_iteration: 1,
            previous_response: None,
            user_inputs: &[],
            report_dir: report_dir.path(),
            cwd: report_dir.path(),
            prior_session: None,
            cancel: &CancelToken::new(),
            batch: None,
            ai_judge_enabled: false,
            on_stream: None,
        };

        let outcome = execute_movement(movement, ctx, &client).await.unwrap();
        assert_eq!(outcome.matched_rule_index, None);
        assert_eq!(client.call_count(), 1, "no extra judge call made when the toggle is off");
    }
}
