//! The five-step rule-match cascade, as a pure function over a movement's
//! declared rules.

use crate::domain::{Movement, RuleMatchMethod};

use super::aggregate;
use super::tag::compile_tag_pattern;

pub struct EvaluationInput<'a> {
    pub movement: &'a Movement,
    pub phase1_content: &'a str,
    pub phase3_tag_content: Option<&'a str>,
    pub sub_matched_conditions: &'a [String],

    /// Set when an AI-judge call was made and returned a tag; `None` means
    /// the AI-judge step is skipped entirely (Open Question (c): the judge
    /// path is optional and can be disabled for deterministic evaluation).
    pub ai_judge_tag: Option<&'a str>,
}

/// Run the cascade: tag-based → aggregate → textual → AI-judge.
/// Returns the first matching rule's index and the method that matched it,
/// or `None` when nothing in the movement's rule list matches — the engine
/// treats that as "no matching rule" and aborts.
pub fn evaluate(input: EvaluationInput) -> Option<(usize, RuleMatchMethod)> {
    let rules = &input.movement.rules;

    for (index, rule) in rules.iter().enumerate() {
        if rule.is_tag_based() {
            let Some(name) = tag_name(&rule.condition) else { continue };
            let Ok(pattern) = compile_tag_pattern(name) else { continue };

            if let Some(content) = input.phase3_tag_content
                && pattern.is_match(content)
            {
                return Some((index, RuleMatchMethod::Tag));
            }
            if pattern.is_match(input.phase1_content) {
                return Some((index, RuleMatchMethod::Tag));
            }
        }
    }

    for (index, rule) in rules.iter().enumerate() {
        let parsed = rule
            .aggregate_type
            .zip(rule.aggregate_condition_text.as_deref())
            .or_else(|| aggregate::parse_aggregate(&rule.condition));

        if let Some((agg_type, expected)) = parsed
            && aggregate::matches(agg_type, expected, input.sub_matched_conditions)
        {
            return Some((index, RuleMatchMethod::Aggregate));
        }
    }

    let lower_content = input.phase1_content.to_lowercase();
    for (index, rule) in rules.iter().enumerate() {
        if rule.is_tag_based() || rule.is_aggregate() {
            continue;
        }
        if lower_content.contains(&rule.condition.to_lowercase()) {
            return Some((index, RuleMatchMethod::Textual));
        }
    }

    if let Some(judged) = input.ai_judge_tag {
        for (index, rule) in rules.iter().enumerate() {
            if rule.is_tag_based() {
                let Some(name) = tag_name(&rule.condition) else { continue };
                let Ok(pattern) = compile_tag_pattern(name) else { continue };
                if pattern.is_match(judged) {
                    return Some((index, RuleMatchMethod::AiJudge));
                }
            }
        }
    }

    None
}

fn tag_name(condition: &str) -> Option<&str> {
    let start = condition.find('[')? + 1;
    let end = condition.find(':')?;
    if end <= start {
        return None;
    }
    Some(&condition[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Movement;

    fn movement(yaml: &str) -> Movement {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn tag_match_wins_over_textual() {
        let m = movement(
            r#"
name: plan
persona: planner
output_contracts: ["plan.md"]
rules:
  - condition: "[PLAN:1] clear"
    next: implement
  - condition: "clear"
    next: review
"#,
        );
        let result = evaluate(EvaluationInput {
            movement: &m,
            phase1_content: "[PLAN:1] clear to proceed",
            phase3_tag_content: None,
            sub_matched_conditions: &[],
            ai_judge_tag: None,
        });
        assert_eq!(result, Some((0, RuleMatchMethod::Tag)));
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let m = movement(
            r#"
name: review
persona: reviewer
rules:
  - condition: "approved"
    next: COMPLETE
  - condition: "rejected"
    next: implement
"#,
        );
        let run = || {
            evaluate(EvaluationInput {
                movement: &m,
                phase1_content: "looks rejected to me",
                phase3_tag_content: None,
                sub_matched_conditions: &[],
                ai_judge_tag: None,
            })
        };
        assert_eq!(run(), run());
        assert_eq!(run(), Some((1, RuleMatchMethod::Textual)));
    }

    #[test]
    fn aggregate_all_matches_parent_rule() {
        let m = movement(
            r#"
name: reviewers
persona: lead
rules:
  - condition: "all(approved)"
    next: verify
"#,
        );
        let subs = vec!["approved".to_string(), "approved".to_string()];
        let result = evaluate(EvaluationInput {
            movement: &m,
            phase1_content: "",
            phase3_tag_content: None,
            sub_matched_conditions: &subs,
            ai_judge_tag: None,
        });
        assert_eq!(result, Some((0, RuleMatchMethod::Aggregate)));
    }

    #[test]
    fn no_match_returns_none_rather_than_picking_any_rule() {
        let m = movement(
            r#"
name: plan
persona: planner
rules:
  - condition: "clear"
    next: COMPLETE
"#,
        );
        let result = evaluate(EvaluationInput {
            movement: &m,
            phase1_content: "no tag matches any rule here",
            phase3_tag_content: None,
            sub_matched_conditions: &[],
            ai_judge_tag: None,
        });
        assert_eq!(result, None);
    }
}
