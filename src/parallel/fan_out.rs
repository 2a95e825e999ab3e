use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::mpsc;

use crate::agent::AgentClient;
use crate::cancel::CancelToken;
use crate::domain::{AggregateType, Movement, Piece, RuleMatchMethod};
use crate::facet::FacetLoader;
use crate::movement::{MovementContext, MovementError, execute_movement};
use crate::rules::{EvaluationInput, evaluate, parse_aggregate};

use super::prefixer::LinePrefixer;

pub struct SubOutcome {
    pub name: String,
    pub matched_condition: Option<String>,
    pub content: String,
    pub failed: bool,
}

pub struct ParallelOutcome {
    pub concatenated_content: String,
    pub sub_outcomes: Vec<SubOutcome>,
    pub matched_rule_index: Option<usize>,
    pub matched_rule_method: Option<RuleMatchMethod>,
    pub all_failed: bool,
}

/// Run `subs` concurrently (via interleaved `.await`, not separate OS
/// threads — each sub-movement is I/O-bound on its own agent call) and
/// aggregate. Shared by the `parallel` and `team_leader` combinators, both
/// of which fan out over a declared list of sub-movements (`arpeggio`'s
/// rows come from a CSV file instead, see `parallel::arpeggio`).
///
/// Each sub's stream events are multiplexed through a shared `LinePrefixer`
/// so the terminal sees `[name]`-prefixed, line-buffered, color-coded output
/// interleaved in real time rather than only the final concatenated report.
pub async fn run_fan_out(
    parent: &Movement,
    subs: &[Movement],
    piece: &Piece,
    facet_loader: &FacetLoader,
    task: &str,
    iteration: u32,
    report_dir: &std::path::Path,
    cwd: &std::path::Path,
    agent_client: &dyn AgentClient,
    cancel: &CancelToken,
    ai_judge_enabled: bool,
) -> ParallelOutcome {
    let names: Vec<String> = subs.iter().map(|s| s.name.clone()).collect();
    let prefixer = Arc::new(Mutex::new(LinePrefixer::new(&names)));

    let futures = subs.iter().map(|sub| {
        let prefixer = prefixer.clone();
        async move {
            let (tx, mut rx) = mpsc::channel(64);
            let ctx = MovementContext {
                piece,
                facet_loader,
                task,
                iteration,
                movement_iteration: 1,
                previous_response: None,
                user_inputs: &[],
                report_dir,
                cwd,
                prior_session: None,
                cancel,
                batch: None,
                ai_judge_enabled,
                on_stream: Some(tx),
            };

            let exec = execute_movement(sub, ctx, agent_client);
            tokio::pin!(exec);

            let mut rx_closed = false;
            let result = loop {
                tokio::select! {
                    biased;
                    event = rx.recv(), if !rx_closed => {
                        match event {
                            Some(event) => {
                                for line in prefixer.lock().unwrap().feed(&sub.name, &event) {
                                    println!("{line}");
                                }
                            }
                            None => rx_closed = true,
                        }
                    }
                    result = &mut exec => break result,
                }
            };

            (sub.name.clone(), result)
        }
    });

    let results: Vec<(String, Result<_, MovementError>)> = join_all(futures).await;

    for line in prefixer.lock().unwrap().flush_remaining() {
        println!("{line}");
    }

    let mut sub_outcomes = Vec::with_capacity(results.len());
    for (name, result) in results {
        match result {
            Ok(outcome) => {
                let matched_condition = outcome
                    .matched_rule_index
                    .and_then(|index| sub_rule_condition(subs, &name, index));
                sub_outcomes.push(SubOutcome {
                    name,
                    matched_condition,
                    content: outcome.response.content,
                    failed: false,
                });
            }
            Err(err) => {
                sub_outcomes.push(SubOutcome {
                    name,
                    matched_condition: None,
                    content: format!("[ERROR] {err}"),
                    failed: true,
                });
            }
        }
    }

    let all_failed = sub_outcomes.iter().all(|s| s.failed);

    let concatenated_content = sub_outcomes
        .iter()
        .map(|s| format!("## {}\n\n{}", s.name, s.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let sub_matched_conditions: Vec<String> = sub_outcomes.iter().filter_map(|s| s.matched_condition.clone()).collect();

    let (matched_rule_index, matched_rule_method) = evaluate(EvaluationInput {
        movement: parent,
        phase1_content: &concatenated_content,
        phase3_tag_content: None,
        sub_matched_conditions: &sub_matched_conditions,
        ai_judge_tag: None,
    })
    .map(|(i, m)| (Some(i), Some(m)))
    .unwrap_or((None, None));

    ParallelOutcome {
        concatenated_content,
        sub_outcomes,
        matched_rule_index,
        matched_rule_method,
        all_failed,
    }
}

fn sub_rule_condition(subs: &[Movement], name: &str, rule_index: usize) -> Option<String> {
    let sub = subs.iter().find(|m| m.name == name)?;
    let rule = sub.rules.get(rule_index)?;

    Some(
        parse_aggregate(&rule.condition)
            .map(|(_, inner)| inner.to_string())
            .unwrap_or_else(|| rule.condition.clone()),
    )
}

/// Helper retained for movements whose aggregate rule uses the pre-parsed
/// `aggregate_type`/`aggregate_condition_text` fields rather than inline
/// `all(x)`/`any(x)` text — kept alongside `run_fan_out` so callers can
/// re-check a specific aggregate type without re-running the cascade.
pub fn matches_aggregate(aggregate_type: AggregateType, expected: &str, sub_matched_conditions: &[String]) -> bool {
    crate::rules::aggregate_matches(aggregate_type, expected, sub_matched_conditions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockAgentClient;
    use tempfile::tempdir;

    fn piece_with_parallel() -> Piece {
        serde_yaml::from_str(
            r#"
name: sample
movements:
  - name: reviewers
    persona: lead
    rules:
      - condition: "all(approved)"
        next: verify
    parallel:
      - name: arch-review
        persona: arch
        rules:
          - condition: "approved"
            next: verify
      - name: qa-review
        persona: qa
        rules:
          - condition: "approved"
            next: verify
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn aggregates_all_approved() {
        let piece = piece_with_parallel();
        let parent = &piece.movements[0];
        let subs = parent.parallel.as_ref().unwrap();

        let facet_loader = FacetLoader::new(tempdir().unwrap().path());
        let client = MockAgentClient::new(vec![
            crate::phase::placeholder_response("arch", "approved, looks solid"),
            crate::phase::placeholder_response("qa", "approved, tests pass"),
        ]);
        let report_dir = tempdir().unwrap();

        let outcome = run_fan_out(
            parent,
            subs,
            &piece,
            &facet_loader,
            "review this",
            1,
            report_dir.path(),
            report_dir.path(),
            &client,
            &CancelToken::new(),
            false,
        )
        .await;

        assert!(!outcome.all_failed);
        assert_eq!(outcome.matched_rule_method, Some(RuleMatchMethod::Aggregate));
    }
}
