//! Arpeggio — CSV-driven batch fan-out (spec.md §4.7). Distinct from
//! `parallel`: sub-movements aren't declared in the piece file, they're
//! stamped out from `config.template` once per batch of CSV rows.
//!
//! Grounded on `nwiizo-ccswarm`'s `workflow/arpeggio.rs` for the
//! batch/concurrency/item-result shape, and on `movement/quality_gate.rs`
//! for spawning `sh -c` to run a user script (the `custom` merge strategy).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::agent::AgentClient;
use crate::cancel::CancelToken;
use crate::domain::{ArpeggioConfig, MergeStrategy, Movement, Piece, RuleMatchMethod};
use crate::facet::FacetLoader;
use crate::movement::{MovementContext, execute_movement};
use crate::rules::{EvaluationInput, evaluate};

use super::fan_out::{ParallelOutcome, SubOutcome};

/// Read a CSV file into one `HashMap<column, value>` per data row. A
/// minimal RFC4180 reader (quoted fields, doubled-quote escapes) rather
/// than a dependency: the grammar this needs is narrow enough that pulling
/// in a crate for it would be the one-crate-per-concept anti-pattern (see
/// DESIGN.md's note on the same call for `colored`).
fn read_csv_rows(path: &Path) -> std::io::Result<Vec<HashMap<String, String>>> {
    let content = std::fs::read_to_string(path)?;
    let mut lines = content.lines();

    let Some(header_line) = lines.next() else {
        return Ok(Vec::new());
    };
    let header = split_csv_line(header_line);

    let rows = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields = split_csv_line(line);
            header
                .iter()
                .cloned()
                .zip(fields.into_iter().chain(std::iter::repeat(String::new())))
                .collect::<HashMap<_, _>>()
        })
        .collect();

    Ok(rows)
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            other => current.push(other),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn render_batch_text(rows: &[HashMap<String, String>]) -> String {
    rows.iter()
        .map(|row| {
            let mut keys: Vec<&String> = row.keys().collect();
            keys.sort();
            keys.iter().map(|k| format!("{k}: {}", row[*k])).collect::<Vec<_>>().join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[allow(clippy::too_many_arguments)]
pub async fn run_arpeggio(
    parent: &Movement,
    config: &ArpeggioConfig,
    piece: &Piece,
    facet_loader: &FacetLoader,
    task: &str,
    iteration: u32,
    report_dir: &Path,
    cwd: &Path,
    agent_client: &dyn AgentClient,
    cancel: &CancelToken,
    ai_judge_enabled: bool,
) -> ParallelOutcome {
    let rows = read_csv_rows(&cwd.join(&config.csv)).unwrap_or_else(|err| {
        warn!(csv = %config.csv, %err, "run_arpeggio: failed to read CSV source, treating as empty");
        Vec::new()
    });

    let batch_size = config.batch_size.max(1) as usize;
    let batches: Vec<Vec<HashMap<String, String>>> = rows.chunks(batch_size).map(<[_]>::to_vec).collect();
    let concurrency = config.concurrency.max(1) as usize;

    let sub_outcomes: Vec<SubOutcome> = stream::iter(batches.into_iter().enumerate())
        .map(|(batch_index, batch)| {
            run_batch_with_retry(config, batch_index, batch, piece, facet_loader, task, iteration, report_dir, cwd, agent_client, cancel, ai_judge_enabled)
        })
        .buffered(concurrency)
        .collect()
        .await;

    let all_failed = !sub_outcomes.is_empty() && sub_outcomes.iter().all(|s| s.failed);
    let merged_content = merge(&config.merge, &sub_outcomes, cwd).await;

    if let Some(output_file) = &config.output_file
        && let Err(err) = std::fs::write(report_dir.join(output_file), &merged_content)
    {
        warn!(output_file, %err, "run_arpeggio: failed to write merged output file");
    }

    let (matched_rule_index, matched_rule_method) = evaluate(EvaluationInput {
        movement: parent,
        phase1_content: &merged_content,
        phase3_tag_content: None,
        sub_matched_conditions: &[],
        ai_judge_tag: None,
    })
    .map(|(i, m)| (Some(i), Some(m)))
    .unwrap_or((None, None));

    ParallelOutcome {
        concatenated_content: merged_content,
        sub_outcomes,
        matched_rule_index,
        matched_rule_method,
        all_failed,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_batch_with_retry(
    config: &ArpeggioConfig,
    batch_index: usize,
    batch: Vec<HashMap<String, String>>,
    piece: &Piece,
    facet_loader: &FacetLoader,
    task: &str,
    iteration: u32,
    report_dir: &Path,
    cwd: &Path,
    agent_client: &dyn AgentClient,
    cancel: &CancelToken,
    ai_judge_enabled: bool,
) -> SubOutcome {
    let name = format!("batch-{batch_index}");
    let batch_text = render_batch_text(&batch);

    let mut last_error = String::new();
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            debug!(batch = %name, attempt, "run_arpeggio: retrying batch");
            tokio::time::sleep(Duration::from_millis(config.retry_delay_ms)).await;
        }

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
            batch: Some(&batch_text),
            ai_judge_enabled,
            on_stream: None,
        };

        match execute_movement(&config.template, ctx, agent_client).await {
            Ok(outcome) if outcome.response.status != crate::domain::AgentStatus::Blocked => {
                let matched_condition = outcome
                    .matched_rule_index
                    .and_then(|i| config.template.rules.get(i))
                    .map(|rule| rule.condition.clone());
                return SubOutcome {
                    name,
                    matched_condition,
                    content: outcome.response.content,
                    failed: false,
                };
            }
            Ok(outcome) => last_error = format!("batch blocked: {}", outcome.response.content),
            Err(err) => last_error = err.to_string(),
        }
    }

    SubOutcome {
        name,
        matched_condition: None,
        content: format!("[ERROR] {last_error}"),
        failed: true,
    }
}

async fn merge(strategy: &MergeStrategy, sub_outcomes: &[SubOutcome], cwd: &Path) -> String {
    match strategy {
        MergeStrategy::Concat { separator } => {
            sub_outcomes.iter().map(|s| s.content.clone()).collect::<Vec<_>>().join(separator)
        }
        MergeStrategy::Custom { script } => run_custom_merge(script, sub_outcomes, cwd).await,
    }
}

async fn run_custom_merge(script: &str, sub_outcomes: &[SubOutcome], cwd: &Path) -> String {
    use std::process::Stdio;
    use tokio::io::AsyncWriteExt;

    let joined = sub_outcomes.iter().map(|s| s.content.clone()).collect::<Vec<_>>().join("\n");

    let child = Command::new("sh")
        .arg("-c")
        .arg(script)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(err) => {
            warn!(%err, "run_arpeggio: failed to spawn custom merge script");
            return joined;
        }
    };

    if let Some(mut stdin) = child.stdin.take()
        && let Err(err) = stdin.write_all(joined.as_bytes()).await
    {
        warn!(%err, "run_arpeggio: failed to write to custom merge script's stdin");
    }

    match child.wait_with_output().await {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout).into_owned(),
        Ok(output) => {
            warn!(stderr = %String::from_utf8_lossy(&output.stderr), "run_arpeggio: custom merge script exited non-zero");
            joined
        }
        Err(err) => {
            warn!(%err, "run_arpeggio: failed to wait on custom merge script");
            joined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockAgentClient;
    use tempfile::tempdir;

    fn piece_with_arpeggio(csv_path: &str) -> Piece {
        serde_yaml::from_str(&format!(
            r#"
name: sample
movements:
  - name: batch-review
    persona: lead
    rules:
      - condition: "all clear"
        next: COMPLETE
    arpeggio:
      csv: {csv_path}
      batch_size: 2
      concurrency: 2
      template:
        name: review-batch
        persona: reviewer
        instruction_template: "Review:\n{{batch}}"
"#
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn batches_rows_and_merges_with_default_concat() {
        let cwd = tempdir().unwrap();
        std::fs::write(cwd.path().join("rows.csv"), "id,name\n1,alice\n2,bob\n3,carol\n").unwrap();

        let piece = piece_with_arpeggio("rows.csv");
        let parent = &piece.movements[0];
        let config = parent.arpeggio.as_ref().unwrap();

        let facet_loader = FacetLoader::new(tempdir().unwrap().path());
        let client = MockAgentClient::new(vec![
            crate::phase::placeholder_response("reviewer", "all clear"),
            crate::phase::placeholder_response("reviewer", "all clear"),
        ]);
        let report_dir = tempdir().unwrap();

        let outcome = run_arpeggio(
            parent,
            config,
            &piece,
            &facet_loader,
            "review rows",
            1,
            report_dir.path(),
            cwd.path(),
            &client,
            &CancelToken::new(),
            false,
        )
        .await;

        assert_eq!(outcome.sub_outcomes.len(), 2, "3 rows at batch_size=2 makes 2 batches");
        assert!(!outcome.all_failed);
        assert_eq!(outcome.matched_rule_method, Some(RuleMatchMethod::Textual));
    }

    #[tokio::test]
    async fn missing_csv_yields_no_batches_rather_than_an_error() {
        let cwd = tempdir().unwrap();
        let piece = piece_with_arpeggio("does-not-exist.csv");
        let parent = &piece.movements[0];
        let config = parent.arpeggio.as_ref().unwrap();

        let facet_loader = FacetLoader::new(tempdir().unwrap().path());
        let client = MockAgentClient::new(Vec::new());
        let report_dir = tempdir().unwrap();

        let outcome = run_arpeggio(
            parent,
            config,
            &piece,
            &facet_loader,
            "review rows",
            1,
            report_dir.path(),
            cwd.path(),
            &client,
            &CancelToken::new(),
            false,
        )
        .await;

        assert!(outcome.sub_outcomes.is_empty());
        assert_eq!(client.call_count(), 0);
    }
}
