use chrono::Utc;
use tracing::debug;

use tokio::sync::mpsc;

use crate::agent::{AgentCallOptions, AgentClient, StreamEvent};
use crate::cancel::CancelToken;
use crate::domain::{AgentResponse, AgentStatus, Movement, Piece};
use crate::facet::{FacetKind, FacetLoader};

use super::types::{PhaseError, PhaseOutcome};

/// Run a movement's phase protocol against `agent_client`. `instruction` is
/// the already-rendered Phase-1 instruction (persona + policy + knowledge +
/// template substitution — built by the Movement Executor). `cancel` is
/// checked before each phase call and threaded into `AgentCallOptions` so
/// the client can surface `interrupted` mid-call. `on_stream` is `Some` only
/// when this movement is a Parallel Runner sub-movement; it's forwarded
/// unchanged to every phase call so the parent can multiplex this
/// sub-movement's output alongside its siblings. Returns once every
/// applicable phase has completed.
#[allow(clippy::too_many_arguments)]
pub async fn run_phases(
    movement: &Movement,
    piece: &Piece,
    facet_loader: &FacetLoader,
    persona_text: &str,
    instruction: &str,
    session_id: Option<String>,
    agent_client: &dyn AgentClient,
    cancel: &CancelToken,
    on_stream: Option<mpsc::Sender<StreamEvent>>,
) -> Result<PhaseOutcome, PhaseError> {
    if cancel.is_cancelled() {
        return Err(PhaseError::Phase1Interrupted);
    }

    let has_reports = !movement.output_contracts.is_empty();

    let mut phase1_tools = movement.allowed_tools.clone();
    if has_reports {
        phase1_tools.retain(|tool| tool != "Write");
    }

    let phase1 = agent_client
        .call(
            persona_text,
            instruction,
            AgentCallOptions {
                session_id: session_id.clone(),
                allowed_tools: phase1_tools,
                mcp_servers: movement.mcp_servers.clone(),
                model: movement.model.clone(),
                permission_mode: movement.required_permission_mode,
                abort_signal: Some(cancel.clone()),
                on_stream: on_stream.clone(),
                ..Default::default()
            },
        )
        .await?;

    match phase1.status {
        AgentStatus::Blocked => return Err(PhaseError::BlockedWithoutCallback),
        AgentStatus::Error => return Err(PhaseError::Phase1Error(phase1.content.clone())),
        AgentStatus::Interrupted => return Err(PhaseError::Phase1Interrupted),
        _ => {}
    }

    let mut session_id = phase1.session_id.clone().or(session_id);

    if has_reports {
        debug!(movement = %movement.name, "run_phases: entering phase 2 (report)");
        let report_instruction = build_report_instruction(movement, piece, facet_loader, instruction);

        let phase2 = agent_client
            .call(
                persona_text,
                &report_instruction,
                AgentCallOptions {
                    session_id: session_id.clone(),
                    allowed_tools: vec!["Write".to_string()],
                    max_turns: Some(3),
                    permission_mode: movement.required_permission_mode,
                    abort_signal: Some(cancel.clone()),
                    on_stream: on_stream.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| PhaseError::Phase2Error(e.to_string()))?;

        if phase2.status == AgentStatus::Error {
            return Err(PhaseError::Phase2Error(phase2.content));
        }
        session_id = phase2.session_id.or(session_id);
    }

    let phase3_tag_content = if movement.needs_status_judgment_phase() {
        debug!(movement = %movement.name, "run_phases: entering phase 3 (judge)");
        let phase3 = agent_client
            .call(
                persona_text,
                "Respond with exactly one status tag matching one of this movement's declared rules.",
                AgentCallOptions {
                    session_id: session_id.clone(),
                    allowed_tools: Vec::new(),
                    max_turns: Some(3),
                    permission_mode: movement.required_permission_mode,
                    abort_signal: Some(cancel.clone()),
                    on_stream: on_stream.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| PhaseError::Phase3Error(e.to_string()))?;

        if phase3.status == AgentStatus::Error {
            return Err(PhaseError::Phase3Error(phase3.content));
        }
        session_id = phase3.session_id.clone().or(session_id);
        Some(phase3.content)
    } else {
        None
    };

    Ok(PhaseOutcome {
        phase1,
        phase3_tag_content,
        session_id,
    })
}

/// Assemble the Phase 2 instruction: each contract's `order` text prepended,
/// the rendered `instructionTemplate` in the middle, and each contract's
/// resolved `format` facet appended — composed once across every contract
/// since multiple output contracts share a single Phase 2 invocation.
fn build_report_instruction(movement: &Movement, piece: &Piece, facet_loader: &FacetLoader, instruction: &str) -> String {
    let mut order_parts = Vec::new();
    let mut format_parts = Vec::new();

    for contract in &movement.output_contracts {
        if let Some(order) = contract.order() {
            order_parts.push(order.to_string());
        }
        if let Some(format_key) = contract.format()
            && let Ok(format_text) = facet_loader.resolve(FacetKind::ReportFormat, format_key, &piece.report_formats)
        {
            format_parts.push(format_text);
        }
    }

    let file_names: Vec<&str> = movement.output_contracts.iter().map(|c| c.file_name()).collect();

    let mut sections = Vec::new();
    sections.push(format!("Write the following report files now: {}.", file_names.join(", ")));
    sections.extend(order_parts);
    sections.push(instruction.to_string());
    sections.extend(format_parts);

    sections.join("\n\n")
}

/// Synthesize a `result` stream event for consumers driving a stream sink
/// directly rather than only reading the final `AgentResponse`. Not used
/// by `run_phases` itself (which calls `AgentClient::call` directly) but
/// shared by the Parallel Runner's sub-movement fan-out.
pub fn result_event(response: AgentResponse) -> StreamEvent {
    StreamEvent::Result(Box::new(response))
}

pub fn placeholder_response(persona: &str, content: impl Into<String>) -> AgentResponse {
    AgentResponse {
        persona: persona.to_string(),
        status: AgentStatus::Done,
        content: content.into(),
        timestamp: Utc::now(),
        session_id: None,
        matched_rule_index: None,
        matched_rule_method: None,
        structured_output: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockAgentClient;

    fn movement(yaml: &str) -> Movement {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn piece_wrapping(m: &Movement) -> Piece {
        Piece {
            name: "sample".to_string(),
            description: None,
            piece_config: None,
            personas: Default::default(),
            policies: Default::default(),
            knowledge: Default::default(),
            instructions: Default::default(),
            report_formats: Default::default(),
            movements: vec![m.clone()],
            initial_movement: None,
            max_movements: 10,
            loop_monitors: Vec::new(),
            interactive_mode: false,
            answer_agent: None,
        }
    }

    #[tokio::test]
    async fn runs_phase1_only_when_no_reports_or_tags() {
        let m = movement(
            r#"
name: plan
persona: planner
rules:
  - condition: "clear"
    next: COMPLETE
"#,
        );
        let piece = piece_wrapping(&m);
        let facet_loader = FacetLoader::new(tempfile::tempdir().unwrap().path());
        let client = MockAgentClient::new(vec![placeholder_response("planner", "looks clear")]);
        let cancel = CancelToken::new();
        let outcome = run_phases(&m, &piece, &facet_loader, "planner persona text", "do the thing", None, &client, &cancel, None)
            .await
            .unwrap();
        assert_eq!(outcome.phase1.content, "looks clear");
        assert!(outcome.phase3_tag_content.is_none());
    }

    #[tokio::test]
    async fn runs_all_three_phases_when_reports_and_tags_present() {
        let m = movement(
            r#"
name: plan
persona: planner
output_contracts: ["plan.md"]
rules:
  - condition: "[PLAN:1] clear"
    next: COMPLETE
"#,
        );
        let piece = piece_wrapping(&m);
        let facet_loader = FacetLoader::new(tempfile::tempdir().unwrap().path());
        let client = MockAgentClient::new(vec![
            placeholder_response("planner", "phase 1 output"),
            placeholder_response("planner", "report written"),
            placeholder_response("planner", "[PLAN:1]"),
        ]);
        let cancel = CancelToken::new();
        let outcome = run_phases(&m, &piece, &facet_loader, "planner persona text", "do the thing", None, &client, &cancel, None)
            .await
            .unwrap();
        assert_eq!(outcome.phase3_tag_content.as_deref(), Some("[PLAN:1]"));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn phase2_instruction_composes_order_and_format_around_the_template() {
        let m = movement(
            r#"
name: plan
persona: planner
output_contracts:
  - file: plan.md
    order: "Be thorough."
    format: plan-format
rules:
  - condition: "clear"
    next: COMPLETE
"#,
        );
        let mut piece = piece_wrapping(&m);
        piece.report_formats.insert("plan-format".to_string(), "Use headings and bullet lists.".to_string());
        let facet_loader = FacetLoader::new(tempfile::tempdir().unwrap().path());

        let instruction = build_report_instruction(&m, &piece, &facet_loader, "do the thing");
        let order_pos = instruction.find("Be thorough.").unwrap();
        let template_pos = instruction.find("do the thing").unwrap();
        let format_pos = instruction.find("Use headings and bullet lists.").unwrap();
        assert!(order_pos < template_pos);
        assert!(template_pos < format_pos);
    }
}
