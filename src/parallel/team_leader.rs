//! `team_leader` variant: the leader persona proposes a JSON array of part
//! specs, capped at `max_parts` (itself capped at 3 — Open Question (b)),
//! and the runner launches one sub per part.

use serde::Deserialize;

use crate::agent::{AgentCallOptions, AgentClient};
use crate::cancel::CancelToken;
use crate::domain::{Movement, Piece, TeamLeaderConfig};
use crate::facet::FacetLoader;

use super::fan_out::{ParallelOutcome, run_fan_out};

#[derive(Debug, Deserialize)]
struct PartSpec {
    id: String,
    #[serde(default)]
    title: Option<String>,
    instruction: String,
}

pub async fn run_team_leader(
    parent: &Movement,
    config: &TeamLeaderConfig,
    piece: &Piece,
    facet_loader: &FacetLoader,
    task: &str,
    iteration: u32,
    report_dir: &std::path::Path,
    cwd: &std::path::Path,
    agent_client: &dyn AgentClient,
    cancel: &CancelToken,
    ai_judge_enabled: bool,
) -> Result<ParallelOutcome, crate::agent::AgentError> {
    let persona_text = facet_loader
        .resolve(crate::facet::FacetKind::Persona, &parent.persona, &piece.personas)
        .unwrap_or_else(|_| parent.persona.clone());

    let planning_prompt = format!(
        "Break the following task into at most {} parts. Respond with a JSON array of objects, each with \
         `id`, optional `title`, and `instruction` fields, and nothing else.\n\nTask: {task}",
        config.max_parts
    );

    let plan_response = agent_client
        .call(
            &persona_text,
            &planning_prompt,
            AgentCallOptions {
                abort_signal: Some(cancel.clone()),
                ..Default::default()
            },
        )
        .await?;

    let parts: Vec<PartSpec> = serde_json::from_str(&plan_response.content).unwrap_or_default();
    let template = config.subs.first().cloned();

    let subs: Vec<Movement> = parts
        .into_iter()
        .take(config.max_parts as usize)
        .enumerate()
        .map(|(i, part)| {
            let mut sub = config
                .subs
                .get(i)
                .cloned()
                .or_else(|| template.clone())
                .expect("team_leader.subs has at least one template movement");
            sub.name = part.title.unwrap_or(part.id);
            sub.instruction = Some(part.instruction);
            sub.instruction_template = None;
            sub
        })
        .collect();

    Ok(run_fan_out(parent, &subs, piece, facet_loader, task, iteration, report_dir, cwd, agent_client, cancel, ai_judge_enabled).await)
}
