//! Tracks recent movement-entry history and detects cycle oscillation
//! (spec.md §4.8): a named `cycle` of movements repeating `threshold` laps
//! in a row trips the monitor.

use crate::agent::{AgentCallOptions, AgentClient};
use crate::cancel::CancelToken;
use crate::domain::{LoopMonitor, Piece};
use crate::facet::FacetKind;

#[derive(Default)]
pub struct LoopMonitorTracker {
    history: Vec<String>,
}

impl LoopMonitorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, movement: &str) {
        self.history.push(movement.to_string());
    }

    /// Forget prior history. Called after a judge call resolves an
    /// oscillation, so the same cycle isn't immediately re-detected.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// The first configured monitor whose `cycle` occupies the last
    /// `cycle.len() * threshold` entries as `threshold` back-to-back laps.
    pub fn detect<'a>(&self, monitors: &'a [LoopMonitor]) -> Option<&'a LoopMonitor> {
        for monitor in monitors {
            let lap_len = monitor.cycle.len();
            let threshold = monitor.threshold as usize;
            if lap_len == 0 || threshold == 0 {
                continue;
            }

            let window_len = lap_len * threshold;
            if self.history.len() < window_len {
                continue;
            }

            let tail = &self.history[self.history.len() - window_len..];
            if tail.chunks(lap_len).all(|lap| lap == monitor.cycle.as_slice()) {
                return Some(monitor);
            }
        }

        None
    }
}

/// Invoke `monitor.judge` with the cycle's accumulated movement outputs and
/// return the movement name (or terminal token) its matched rule names, if
/// any. `None` means the judge call failed or matched none of its rules —
/// callers fall back to aborting the run.
pub async fn judge_cycle(
    monitor: &LoopMonitor,
    accumulated_content: &str,
    piece: &Piece,
    facet_loader: &crate::facet::FacetLoader,
    agent_client: &dyn AgentClient,
    cancel: &CancelToken,
) -> Option<String> {
    if monitor.rules.is_empty() || cancel.is_cancelled() {
        return None;
    }

    let persona_text = facet_loader.resolve(FacetKind::Persona, &monitor.judge, &piece.personas).ok()?;

    let candidates: String = monitor
        .rules
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{i}: {}", rule.condition))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "The movements {:?} have repeated {} times in a row without resolving. \
         Pick the single best-matching rule by index to break the cycle and respond with \
         exactly one line: `[JUDGE:<index>]`.\n\nAccumulated output:\n{accumulated_content}\n\nRules:\n{candidates}",
        monitor.cycle, monitor.threshold
    );

    let judged = agent_client
        .call(
            &persona_text,
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

    let digits: String = judged.content.split("JUDGE:").nth(1)?.chars().take_while(|c| c.is_ascii_digit()).collect();
    let index: usize = digits.parse().ok()?;

    monitor.rules.get(index)?.next.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockAgentClient;
    use crate::domain::Rule;
    use crate::facet::FacetLoader;
    use tempfile::tempdir;

    fn monitor() -> LoopMonitor {
        LoopMonitor {
            cycle: vec!["plan".to_string(), "implement".to_string()],
            threshold: 2,
            judge: "arbiter".to_string(),
            rules: vec![Rule {
                condition: "break the cycle".to_string(),
                next: Some("escalate".to_string()),
                appendix: None,
                requires_user_input: false,
                interactive_only: false,
                aggregate_type: None,
                aggregate_condition_text: None,
            }],
        }
    }

    #[test]
    fn detects_a_cycle_repeated_threshold_times() {
        let mut tracker = LoopMonitorTracker::new();
        let monitors = vec![monitor()];

        for name in ["plan", "implement"] {
            tracker.record(name);
        }
        assert!(tracker.detect(&monitors).is_none(), "only one lap so far");

        for name in ["plan", "implement"] {
            tracker.record(name);
        }
        assert!(tracker.detect(&monitors).is_some());
    }

    #[test]
    fn a_different_cycle_never_trips_the_monitor() {
        let mut tracker = LoopMonitorTracker::new();
        let monitors = vec![monitor()];

        for name in ["plan", "implement", "plan", "review"] {
            tracker.record(name);
        }
        assert!(tracker.detect(&monitors).is_none());
    }

    #[test]
    fn reset_clears_history() {
        let mut tracker = LoopMonitorTracker::new();
        let monitors = vec![monitor()];
        for name in ["plan", "implement", "plan", "implement"] {
            tracker.record(name);
        }
        assert!(tracker.detect(&monitors).is_some());
        tracker.reset();
        assert!(tracker.detect(&monitors).is_none());
    }

    #[tokio::test]
    async fn judge_cycle_resolves_to_the_matched_rules_next() {
        let piece: Piece = serde_yaml::from_str(
            r#"
name: sample
personas:
  arbiter: "you arbitrate stuck cycles"
movements:
  - name: plan
    persona: planner
"#,
        )
        .unwrap();
        let facet_loader = FacetLoader::new(tempdir().unwrap().path());
        let client = MockAgentClient::new(vec![crate::phase::placeholder_response("arbiter", "[JUDGE:0]")]);

        let next = judge_cycle(&monitor(), "plan and implement keep disagreeing", &piece, &facet_loader, &client, &CancelToken::new())
            .await;

        assert_eq!(next, Some("escalate".to_string()));
    }

    #[tokio::test]
    async fn judge_cycle_returns_none_when_the_agent_call_fails() {
        let piece: Piece = serde_yaml::from_str(
            r#"
name: sample
movements:
  - name: plan
    persona: planner
"#,
        )
        .unwrap();
        let facet_loader = FacetLoader::new(tempdir().unwrap().path());
        let client = MockAgentClient::new(Vec::new());

        let next = judge_cycle(&monitor(), "stuck", &piece, &facet_loader, &client, &CancelToken::new()).await;
        assert_eq!(next, None);
    }
}
