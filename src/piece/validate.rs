//! Piece graph validation, run once at load time.
//!
//! Rule edges are resolved as symbolic strings against an immutable node
//! table built from declared movement names plus the two reserved virtual
//! terminals `COMPLETE`/`ABORT` (Design Notes). Cycles among real movements
//! are legal — the oscillation scenario in the testable properties relies on
//! it — so this only checks that every edge target exists, not that the
//! graph is acyclic.

use std::collections::HashSet;

use crate::domain::{Piece, is_terminal_token};

use super::error::PieceValidationError;

pub fn validate_piece(piece: &Piece) -> Result<(), PieceValidationError> {
    let node_table: HashSet<&str> = piece.movements.iter().map(|m| m.name.as_str()).collect();

    if let Some(initial) = &piece.initial_movement
        && !node_table.contains(initial.as_str())
    {
        return Err(PieceValidationError::UnknownInitialMovement {
            piece: piece.name.clone(),
            name: initial.clone(),
        });
    }

    for movement in &piece.movements {
        validate_movement(&piece.name, movement, &node_table)?;
    }

    Ok(())
}

fn validate_movement(
    piece_name: &str,
    movement: &crate::domain::Movement,
    node_table: &HashSet<&str>,
) -> Result<(), PieceValidationError> {
    if movement.has_conflicting_combinators() {
        return Err(PieceValidationError::ConflictingCombinators {
            piece: piece_name.to_string(),
            movement: movement.name.clone(),
        });
    }

    if let Some(team_leader) = &movement.team_leader
        && team_leader.max_parts > 3
    {
        return Err(PieceValidationError::TeamLeaderMaxPartsExceeded {
            piece: piece_name.to_string(),
            movement: movement.name.clone(),
            max_parts: team_leader.max_parts,
        });
    }

    let mut rules_without_next = 0;
    for (index, rule) in movement.rules.iter().enumerate() {
        match &rule.next {
            Some(target) if node_table.contains(target.as_str()) || is_terminal_token(target) => {}
            Some(target) => {
                return Err(PieceValidationError::UnknownRuleTarget {
                    piece: piece_name.to_string(),
                    movement: movement.name.clone(),
                    rule_index: index,
                    target: target.clone(),
                });
            }
            None => rules_without_next += 1,
        }

        if rule.is_tag_based() && movement.output_contracts.is_empty() {
            return Err(PieceValidationError::TagRuleWithoutOutputContract {
                piece: piece_name.to_string(),
                movement: movement.name.clone(),
                rule_index: index,
            });
        }
    }

    if rules_without_next > 1 {
        return Err(PieceValidationError::MultipleRulesWithoutNext {
            piece: piece_name.to_string(),
            movement: movement.name.clone(),
        });
    }

    for sub in movement
        .parallel
        .iter()
        .flatten()
        .chain(movement.arpeggio.iter().map(|a| a.template.as_ref()))
        .chain(movement.team_leader.iter().flat_map(|t| t.subs.iter()))
    {
        validate_movement(piece_name, sub, node_table)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Piece {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn rejects_unknown_rule_target() {
        let piece = parse(
            r#"
name: sample
movements:
  - name: plan
    persona: planner
    output_contracts: ["plan.md"]
    rules:
      - condition: "[PLAN:1] clear"
        next: nowhere
"#,
        );
        assert!(matches!(validate_piece(&piece), Err(PieceValidationError::UnknownRuleTarget { .. })));
    }

    #[test]
    fn accepts_terminal_tokens() {
        let piece = parse(
            r#"
name: sample
movements:
  - name: plan
    persona: planner
    output_contracts: ["plan.md"]
    rules:
      - condition: "[PLAN:1] clear"
        next: COMPLETE
"#,
        );
        assert!(validate_piece(&piece).is_ok());
    }

    #[test]
    fn rejects_tag_rule_without_output_contract() {
        let piece = parse(
            r#"
name: sample
movements:
  - name: plan
    persona: planner
    rules:
      - condition: "[PLAN:1] clear"
        next: COMPLETE
"#,
        );
        assert!(matches!(
            validate_piece(&piece),
            Err(PieceValidationError::TagRuleWithoutOutputContract { .. })
        ));
    }

    #[test]
    fn allows_cycles_among_real_movements() {
        let piece = parse(
            r#"
name: sample
movements:
  - name: plan
    persona: planner
    output_contracts: ["plan.md"]
    rules:
      - condition: "needs more work"
        next: implement
  - name: implement
    persona: coder
    output_contracts: ["impl.md"]
    rules:
      - condition: "needs replanning"
        next: plan
"#,
        );
        assert!(validate_piece(&piece).is_ok());
    }
}
