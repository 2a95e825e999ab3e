//! `[NAME:N]` tag detection, anchored and compiled once per movement.

use regex::Regex;
use thiserror::Error;

/// Conservative caps so a malicious or malformed piece file can't make the
/// Rule Evaluator pathologically slow: regex source length, and a denylist
/// of constructs known to cause catastrophic backtracking.
const MAX_PATTERN_LEN: usize = 256;
const BACKTRACK_DENYLIST: &[&str] = &["(.*)+", "(.+)+", "(a+)+", "([a-zA-Z]+)*"];

#[derive(Debug, Error)]
pub enum TagError {
    #[error("tag pattern exceeds the {MAX_PATTERN_LEN}-byte cap")]
    TooLong,

    #[error("tag pattern matches a known catastrophic-backtracking shape")]
    Denylisted,

    #[error("invalid tag regex: {0}")]
    Invalid(#[from] regex::Error),
}

/// Build the anchored pattern matching a literal `[NAME:N]` tag, where
/// `name` is the outputContract-derived tag name (case-sensitive).
pub fn compile_tag_pattern(name: &str) -> Result<Regex, TagError> {
    let source = format!(r"\[{}:\d+\]", regex::escape(name));

    if source.len() > MAX_PATTERN_LEN {
        return Err(TagError::TooLong);
    }
    if BACKTRACK_DENYLIST.iter().any(|bad| source.contains(bad)) {
        return Err(TagError::Denylisted);
    }

    Ok(Regex::new(&source)?)
}

/// Scan `content` for the first occurrence of `pattern`, returning the
/// matched literal text (e.g. `"[PLAN:1]"`).
pub fn extract_tag<'a>(pattern: &Regex, content: &'a str) -> Option<&'a str> {
    pattern.find(content).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_literal_tag() {
        let pattern = compile_tag_pattern("PLAN").unwrap();
        assert_eq!(extract_tag(&pattern, "prefix [PLAN:1] suffix"), Some("[PLAN:1]"));
    }

    #[test]
    fn no_match_returns_none() {
        let pattern = compile_tag_pattern("PLAN").unwrap();
        assert_eq!(extract_tag(&pattern, "nothing here"), None);
    }

    #[test]
    fn rejects_oversized_pattern() {
        let huge_name = "x".repeat(MAX_PATTERN_LEN);
        assert!(matches!(compile_tag_pattern(&huge_name), Err(TagError::TooLong)));
    }
}
