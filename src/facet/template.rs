//! Instruction-template placeholder substitution.
//!
//! The teacher renders prompt templates with `handlebars`; TAKT's
//! `instructionTemplate` placeholders are a small closed set rather than a
//! general templating grammar, so substitution is a direct pass rather than
//! a handlebars registry. Substituted runtime values that themselves contain
//! `{`/`}` are escaped to their full-width lookalikes (｛｝) first so a report
//! body or agent response can never reopen a placeholder.

use std::collections::HashMap;
use std::path::PathBuf;

pub struct TemplateContext {
    pub task: String,
    pub iteration: u32,
    pub max_movements: u32,
    pub movement_iteration: u32,
    pub previous_response: Option<String>,
    pub user_inputs: Vec<String>,
    pub report_dir: PathBuf,
    pub cwd: PathBuf,
    pub reports: HashMap<String, String>,

    /// Set only when rendering an arpeggio batch template: the batch's CSV
    /// rows, pre-formatted as `key: value` lines separated by blank lines.
    #[allow(clippy::struct_field_names)]
    pub batch: Option<String>,
}

fn escape_braces(value: &str) -> String {
    value.replace('{', "｛").replace('}', "｝")
}

pub fn render(template: &str, ctx: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }

        let Some(end) = template[i..].find('}') else {
            out.push(c);
            continue;
        };
        let placeholder = &template[i + 1..i + end];

        let resolved = resolve_placeholder(placeholder, ctx);
        match resolved {
            Some(value) => out.push_str(&value),
            None => {
                out.push('{');
                out.push_str(placeholder);
                out.push('}');
            }
        }

        for _ in 0..end {
            chars.next();
        }
    }

    out
}

fn resolve_placeholder(placeholder: &str, ctx: &TemplateContext) -> Option<String> {
    if let Some(file_name) = placeholder.strip_prefix("report:") {
        return ctx
            .reports
            .get(file_name)
            .map(|content| escape_braces(content));
    }

    let value = match placeholder {
        "task" => escape_braces(&ctx.task),
        "iteration" => ctx.iteration.to_string(),
        "max_movements" => ctx.max_movements.to_string(),
        "movement_iteration" => ctx.movement_iteration.to_string(),
        "previous_response" => escape_braces(ctx.previous_response.as_deref().unwrap_or("")),
        "user_inputs" => escape_braces(&ctx.user_inputs.join("\n")),
        "report_dir" => ctx.report_dir.display().to_string(),
        "cwd" => ctx.cwd.display().to_string(),
        "batch" => escape_braces(ctx.batch.as_deref().unwrap_or("")),
        _ => return None,
    };

    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_ctx() -> TemplateContext {
        TemplateContext {
            task: "fix the login bug".to_string(),
            iteration: 2,
            max_movements: 10,
            movement_iteration: 1,
            previous_response: Some("all clear".to_string()),
            user_inputs: vec!["please hurry".to_string()],
            report_dir: PathBuf::from("/tmp/reports/fix-login-bug"),
            cwd: PathBuf::from("/work/repo"),
            reports: HashMap::new(),
            batch: None,
        }
    }

    #[test]
    fn substitutes_known_placeholders() {
        let ctx = base_ctx();
        let rendered = render("Task: {task}, iteration {iteration}/{max_movements}", &ctx);
        assert_eq!(rendered, "Task: fix the login bug, iteration 2/10");
    }

    #[test]
    fn leaves_unknown_placeholders_untouched() {
        let ctx = base_ctx();
        let rendered = render("{mystery}", &ctx);
        assert_eq!(rendered, "{mystery}");
    }

    #[test]
    fn escapes_braces_in_substituted_values() {
        let mut ctx = base_ctx();
        ctx.previous_response = Some("contains {braces} in it".to_string());
        let rendered = render("{previous_response}", &ctx);
        assert_eq!(rendered, "contains ｛braces｝ in it");
    }

    #[test]
    fn resolves_batch_when_set() {
        let mut ctx = base_ctx();
        ctx.batch = Some("id: 1\nname: Alice".to_string());
        let rendered = render("{batch}", &ctx);
        assert_eq!(rendered, "id: 1\nname: Alice");
    }

    #[test]
    fn batch_placeholder_is_empty_when_unset() {
        let ctx = base_ctx();
        assert_eq!(render("{batch}", &ctx), "");
    }

    #[test]
    fn resolves_report_by_name() {
        let mut ctx = base_ctx();
        ctx.reports.insert("summary.md".to_string(), "all good".to_string());
        let rendered = render("{report:summary.md}", &ctx);
        assert_eq!(rendered, "all good");
    }
}
