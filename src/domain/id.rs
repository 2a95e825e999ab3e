//! Slug and report-directory name generation
//!
//! Report directories are named `<slug>-<timestamp>`. The slug is derived
//! from the task description the same way the teacher derives domain ids
//! from titles: lowercase, apostrophes stripped outright, every other
//! non-alphanumeric run collapsed to a single hyphen.

use chrono::{DateTime, Utc};

/// Slugify free text for use in a filesystem path segment.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Generate a report-directory name: `<slug>-YYYY-MM-DDTHH-mm-ss.SSS`.
pub fn generate_slug(text: &str, at: DateTime<Utc>) -> String {
    let slug = slugify(text);
    let stamp = at.format("%Y-%m-%dT%H-%M-%S%.3f");
    format!("{slug}-{stamp}")
}

/// Generate a `completed/`/`failed/` run-directory name:
/// `YYYY-MM-DDTHH-mm-ss.SSS_<name>`, where `name` is the task file's stem
/// (its file name with the extension stripped).
pub fn generate_run_dir_name(file_stem: &str, at: DateTime<Utc>) -> String {
    let stamp = at.format("%Y-%m-%dT%H-%M-%S%.3f");
    format!("{stamp}_{file_stem}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_apostrophes_and_collapses_punctuation() {
        assert_eq!(slugify("don't stop"), "dont-stop");
        assert_eq!(slugify("Fix the OAuth bug!!"), "fix-the-oauth-bug");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
    }

    #[test]
    fn generate_slug_appends_timestamp() {
        let at = DateTime::parse_from_rfc3339("2026-07-28T10:30:00.125Z").unwrap().with_timezone(&Utc);
        assert_eq!(generate_slug("Fix login bug", at), "fix-login-bug-2026-07-28T10-30-00.125");
    }

    #[test]
    fn generate_run_dir_name_prefixes_stem_with_timestamp() {
        let at = DateTime::parse_from_rfc3339("2026-07-28T10:30:00.125Z").unwrap().with_timezone(&Utc);
        assert_eq!(generate_run_dir_name("my", at), "2026-07-28T10-30-00.125_my");
    }
}
