//! Piece / Movement / Rule — the workflow graph loaded from YAML.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named workflow: a directed graph of movements plus piece-level facet
/// maps. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Piece {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub piece_config: Option<PieceConfig>,

    #[serde(default)]
    pub personas: HashMap<String, String>,

    #[serde(default)]
    pub policies: HashMap<String, String>,

    #[serde(default)]
    pub knowledge: HashMap<String, String>,

    #[serde(default)]
    pub instructions: HashMap<String, String>,

    #[serde(default)]
    pub report_formats: HashMap<String, String>,

    pub movements: Vec<Movement>,

    /// Defaults to the first movement in `movements` when absent.
    #[serde(default)]
    pub initial_movement: Option<String>,

    #[serde(default = "default_max_movements")]
    pub max_movements: u32,

    #[serde(default)]
    pub loop_monitors: Vec<LoopMonitor>,

    #[serde(default)]
    pub interactive_mode: bool,

    #[serde(default)]
    pub answer_agent: Option<String>,
}

fn default_max_movements() -> u32 {
    10
}

/// A Phase 2 report target. The common case is a bare file name; a
/// movement that needs `order`/`format` composition (§4.5) spells out the
/// long form instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputContract {
    Bare(String),
    Detailed {
        file: String,

        /// Literal text prepended to the Phase 2 instruction, ahead of the
        /// rendered `instructionTemplate`.
        #[serde(default)]
        order: Option<String>,

        /// `report_formats` facet key whose resolved text is appended
        /// after the rendered `instructionTemplate`.
        #[serde(default)]
        format: Option<String>,
    },
}

impl OutputContract {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Bare(name) => name,
            Self::Detailed { file, .. } => file,
        }
    }

    pub fn order(&self) -> Option<&str> {
        match self {
            Self::Bare(_) => None,
            Self::Detailed { order, .. } => order.as_deref(),
        }
    }

    pub fn format(&self) -> Option<&str> {
        match self {
            Self::Bare(_) => None,
            Self::Detailed { format, .. } => format.as_deref(),
        }
    }
}

impl Piece {
    /// The movement the engine starts from: the declared `initial_movement`
    /// or, when absent, the first movement in declaration order.
    pub fn initial_movement_name(&self) -> Option<&str> {
        self.initial_movement
            .as_deref()
            .or_else(|| self.movements.first().map(|m| m.name.as_str()))
    }

    pub fn movement(&self, name: &str) -> Option<&Movement> {
        self.movements.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieceConfig {
    #[serde(default)]
    pub provider_options: HashMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub runtime: Option<RuntimeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub prepare: Option<String>,
}

/// A named sequence of movements watched for oscillation (spec.md §4.8). A
/// "lap" is one full traversal of `cycle`; when `threshold` laps repeat back
/// to back, `judge` is invoked with the cycle's accumulated outputs and one
/// of its own `rules` overrides the movement that would otherwise run next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopMonitor {
    pub cycle: Vec<String>,

    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// Persona key (or direct file path) asked to resolve the oscillation.
    pub judge: String,

    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_threshold() -> u32 {
    3
}

/// A state/node in a piece.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub name: String,

    /// Persona key (resolved against the piece's `personas` map or the
    /// Facet Loader) or a direct file path.
    pub persona: String,

    #[serde(default)]
    pub policy: Option<String>,

    #[serde(default)]
    pub knowledge: Option<String>,

    #[serde(default)]
    pub instruction: Option<String>,

    #[serde(default)]
    pub instruction_template: Option<String>,

    #[serde(default)]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub output_contracts: Vec<OutputContract>,

    #[serde(default)]
    pub quality_gates: Vec<String>,

    #[serde(default)]
    pub allowed_tools: Vec<String>,

    #[serde(default)]
    pub mcp_servers: HashMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub required_permission_mode: PermissionMode,

    #[serde(default)]
    pub edit: bool,

    #[serde(default)]
    pub session: SessionDirective,

    #[serde(default)]
    pub pass_previous_response: bool,

    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub provider_options: HashMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub parallel: Option<Vec<Movement>>,

    #[serde(default)]
    pub arpeggio: Option<ArpeggioConfig>,

    #[serde(default)]
    pub team_leader: Option<TeamLeaderConfig>,
}

impl Movement {
    /// Which of the three fan-out combinators (if any) this movement uses.
    pub fn parallel_kind(&self) -> Option<ParallelKind> {
        match (&self.parallel, &self.arpeggio, &self.team_leader) {
            (Some(subs), None, None) => Some(ParallelKind::Parallel(subs)),
            (None, Some(cfg), None) => Some(ParallelKind::Arpeggio(cfg)),
            (None, None, Some(cfg)) => Some(ParallelKind::TeamLeader(cfg)),
            (None, None, None) => None,
            _ => None, // genuinely ambiguous states are rejected at load time
        }
    }

    /// `true` when at least one rule depends on a tag, meaning Phase 3
    /// (judge) must run to produce content for the Rule Evaluator's
    /// tag-based step.
    pub fn needs_status_judgment_phase(&self) -> bool {
        self.rules.iter().any(Rule::is_tag_based)
    }

    /// `true` when `parallel`, `arpeggio`, and `team_leader` are not all
    /// mutually exclusive — caught by Piece Loader validation.
    pub fn has_conflicting_combinators(&self) -> bool {
        [self.parallel.is_some(), self.arpeggio.is_some(), self.team_leader.is_some()]
            .iter()
            .filter(|present| **present)
            .count()
            > 1
    }
}

pub enum ParallelKind<'a> {
    Parallel(&'a [Movement]),
    Arpeggio(&'a ArpeggioConfig),
    TeamLeader(&'a TeamLeaderConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamLeaderConfig {
    pub subs: Vec<Movement>,

    #[serde(default = "default_max_parts")]
    pub max_parts: u32,
}

fn default_max_parts() -> u32 {
    3
}

/// Data-driven batch fan-out: one movement instance per batch of CSV rows
/// (spec.md §4.7). Distinct from `parallel`, whose sub-movements are
/// declared statically in the piece file rather than read from a data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArpeggioConfig {
    /// Path to the CSV source, resolved against the run's working directory.
    pub csv: String,

    /// Movement template rendered once per batch; `{batch}` in its
    /// `instruction`/`instruction_template` resolves to the batch's rows.
    pub template: Box<Movement>,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_arpeggio_concurrency")]
    pub concurrency: u32,

    #[serde(default)]
    pub merge: MergeStrategy,

    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Optional file name, written under the run's report directory, holding
    /// the merged batch output.
    #[serde(default)]
    pub output_file: Option<String>,
}

fn default_batch_size() -> u32 {
    1
}

fn default_arpeggio_concurrency() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    1000
}

/// How per-batch outputs combine into the parent movement's single response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Batch outputs joined in batch order with `separator` between them.
    Concat {
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Batch outputs piped (newline-joined) to `sh -c script`'s stdin;
    /// its stdout becomes the merged content.
    Custom { script: String },
}

impl Default for MergeStrategy {
    fn default() -> Self {
        Self::Concat { separator: default_separator() }
    }
}

fn default_separator() -> String {
    "\n\n---\n\n".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMode {
    #[default]
    Readonly,
    Edit,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionDirective {
    #[default]
    Continue,
    Refresh,
}

/// A candidate outgoing edge from a movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub condition: String,

    /// Absent only for a rule on a sub-movement of a parallel container.
    #[serde(default)]
    pub next: Option<String>,

    #[serde(default)]
    pub appendix: Option<String>,

    #[serde(default)]
    pub requires_user_input: bool,

    #[serde(default)]
    pub interactive_only: bool,

    #[serde(default)]
    pub aggregate_type: Option<AggregateType>,

    #[serde(default)]
    pub aggregate_condition_text: Option<String>,
}

impl Rule {
    pub fn is_aggregate(&self) -> bool {
        self.aggregate_type.is_some()
    }

    pub fn is_tag_based(&self) -> bool {
        self.condition.starts_with('[') && self.condition.contains(']')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateType {
    All,
    Any,
}

/// Reserved terminal tokens a `rule.next` may name instead of a real
/// movement. Modeled as virtual nodes, not part of the movement table.
pub const TERMINAL_COMPLETE: &str = "COMPLETE";
pub const TERMINAL_ABORT: &str = "ABORT";

pub fn is_terminal_token(name: &str) -> bool {
    name == TERMINAL_COMPLETE || name == TERMINAL_ABORT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_movement_defaults_to_first() {
        let piece: Piece = serde_yaml::from_str(
            r#"
name: sample
movements:
  - name: plan
    persona: planner
  - name: implement
    persona: coder
"#,
        )
        .unwrap();
        assert_eq!(piece.initial_movement_name(), Some("plan"));
    }

    #[test]
    fn conflicting_combinators_detected() {
        let m: Movement = serde_yaml::from_str(
            r#"
name: reviewers
persona: lead
parallel:
  - name: arch
    persona: arch-reviewer
team_leader:
  subs:
    - name: qa
      persona: qa-reviewer
"#,
        )
        .unwrap();
        assert!(m.has_conflicting_combinators());
    }

    #[test]
    fn arpeggio_config_parses_with_defaults() {
        let m: Movement = serde_yaml::from_str(
            r#"
name: batch-review
persona: lead
arpeggio:
  csv: reviews.csv
  template:
    name: review-batch
    persona: reviewer
    instruction_template: "Review: {batch}"
"#,
        )
        .unwrap();
        let cfg = m.arpeggio.unwrap();
        assert_eq!(cfg.batch_size, 1);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.max_retries, 0);
        assert!(matches!(cfg.merge, MergeStrategy::Concat { .. }));
    }

    #[test]
    fn terminal_tokens_recognized() {
        assert!(is_terminal_token(TERMINAL_COMPLETE));
        assert!(is_terminal_token(TERMINAL_ABORT));
        assert!(!is_terminal_token("implement"));
    }

    #[test]
    fn tag_based_rule_detection() {
        let rule = Rule {
            condition: "[PLAN:1] clear".to_string(),
            next: Some("implement".to_string()),
            appendix: None,
            requires_user_input: false,
            interactive_only: false,
            aggregate_type: None,
            aggregate_condition_text: None,
        };
        assert!(rule.is_tag_based());
    }
}
