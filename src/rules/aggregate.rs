//! `all(x)`/`any(x)` aggregate rule matching for parallel containers.

use crate::domain::AggregateType;

/// Parse an inline `all(x)`/`any(x)` condition into its type and inner text.
/// A rule that already carries an explicit `aggregate_type` field (set by a
/// piece author who prefers the structured form) takes precedence over this
/// at the call site; this only covers the compact inline syntax.
pub fn parse_aggregate(condition: &str) -> Option<(AggregateType, &str)> {
    let condition = condition.trim();

    if let Some(inner) = condition.strip_prefix("all(").and_then(|s| s.strip_suffix(')')) {
        return Some((AggregateType::All, inner.trim()));
    }
    if let Some(inner) = condition.strip_prefix("any(").and_then(|s| s.strip_suffix(')')) {
        return Some((AggregateType::Any, inner.trim()));
    }

    None
}

/// `all(x)` matches when every sub's matched condition text equals `x`;
/// `any(x)` matches when at least one does. `all` is checked before `any`
/// by the caller iterating rules in declared order, so no ordering logic
/// lives here.
pub fn matches(aggregate_type: AggregateType, expected: &str, sub_matched_conditions: &[String]) -> bool {
    match aggregate_type {
        AggregateType::All => !sub_matched_conditions.is_empty() && sub_matched_conditions.iter().all(|c| c == expected),
        AggregateType::Any => sub_matched_conditions.iter().any(|c| c == expected),
    }
}
