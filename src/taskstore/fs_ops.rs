//! Plain filesystem operations over `.takt/{tasks,completed,failed}/`.
//!
//! Kept free of any locking or actor concerns so the actor module can own
//! serialization while these functions stay independently testable.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::{Task, generate_run_dir_name};

use super::error::TaskStoreError;

/// A task file discovered under `tasks/`, its on-disk name and parsed body.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub file_name: String,
    pub task: Task,
}

fn tasks_dir(takt_dir: &Path) -> PathBuf {
    takt_dir.join("tasks")
}

fn completed_dir(takt_dir: &Path) -> PathBuf {
    takt_dir.join("completed")
}

fn failed_dir(takt_dir: &Path) -> PathBuf {
    takt_dir.join("failed")
}

fn io_err(path: &Path, source: std::io::Error) -> TaskStoreError {
    TaskStoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn file_stem_of(file_name: &str) -> &str {
    Path::new(file_name).file_stem().and_then(|s| s.to_str()).unwrap_or(file_name)
}

/// Enumerate pending tasks, sorted by file name for deterministic claim
/// order. A `TASK-FORMAT` marker file (extensionless, documents the schema
/// for humans browsing the directory) is skipped rather than parsed.
pub fn list_tasks(takt_dir: &Path) -> Result<Vec<TaskEntry>, TaskStoreError> {
    let dir = tasks_dir(takt_dir);
    debug!(dir = %dir.display(), "list_tasks: called");

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .map_err(|e| io_err(&dir, e))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name != "TASK-FORMAT" && Path::new(name).extension().is_some())
        .collect();
    names.sort();

    names
        .into_iter()
        .map(|file_name| {
            let path = dir.join(&file_name);
            let content = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            let task: Task = serde_yaml::from_str(&content).map_err(|e| TaskStoreError::Yaml {
                path: path.display().to_string(),
                source: e,
            })?;
            Ok(TaskEntry { file_name, task })
        })
        .collect()
}

/// Claim up to `k` pending tasks in file-name order. `k=0` is a no-op that
/// performs no filesystem access.
pub fn claim_next_tasks(takt_dir: &Path, k: usize) -> Result<Vec<TaskEntry>, TaskStoreError> {
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut entries = list_tasks(takt_dir)?;
    entries.truncate(k);
    Ok(entries)
}

/// Move a claimed task's file into a fresh `completed/<ts>_<name>/` run
/// directory alongside its `report.md` and `log.json`.
pub fn complete_task(
    takt_dir: &Path,
    file_name: &str,
    record: &crate::domain::RunRecord,
) -> Result<(), TaskStoreError> {
    if record.status != crate::domain::RunStatus::Completed {
        return Err(TaskStoreError::CompleteCalledOnFailure(file_name.to_string()));
    }

    move_into_run_dir(takt_dir, &completed_dir(takt_dir), file_name, record)
}

/// Move a claimed task's file into a fresh `failed/<ts>_<name>/` run
/// directory alongside its `report.md` and `log.json`. Failed tasks never
/// land in `completed/`.
pub fn fail_task(takt_dir: &Path, file_name: &str, record: &crate::domain::RunRecord) -> Result<(), TaskStoreError> {
    move_into_run_dir(takt_dir, &failed_dir(takt_dir), file_name, record)
}

fn move_into_run_dir(
    takt_dir: &Path,
    lifecycle_dir: &Path,
    file_name: &str,
    record: &crate::domain::RunRecord,
) -> Result<(), TaskStoreError> {
    let src = tasks_dir(takt_dir).join(file_name);
    let run_dir_name = generate_run_dir_name(file_stem_of(file_name), record.completed_at);
    let run_dir = lifecycle_dir.join(&run_dir_name);
    std::fs::create_dir_all(&run_dir).map_err(|e| io_err(&run_dir, e))?;

    let dest = run_dir.join(file_name);
    std::fs::rename(&src, &dest).map_err(|e| io_err(&src, e))?;

    write_report_md(&run_dir, record)?;
    write_log_json(&run_dir, record)
}

/// A localized markdown summary: task name, outcome, duration, execution
/// log, and the final agent response.
fn write_report_md(run_dir: &Path, record: &crate::domain::RunRecord) -> Result<(), TaskStoreError> {
    let outcome = match record.status {
        crate::domain::RunStatus::Completed => "completed",
        crate::domain::RunStatus::Failed => "failed",
    };
    let duration = record.completed_at.signed_duration_since(record.started_at);
    let duration_secs = duration.num_milliseconds().max(0) as f64 / 1000.0;

    let mut body = format!(
        "# Task Report: {}\n\n**Outcome:** {outcome}\n**Duration:** {duration_secs:.3}s\n",
        record.task
    );

    if let Some(error) = &record.error {
        body.push_str(&format!("**Error:** {error}\n"));
    }

    body.push_str("\n## Execution Log\n\n");
    if record.execution_log.is_empty() {
        body.push_str("(no events recorded)\n");
    } else {
        for line in &record.execution_log {
            body.push_str(&format!("- {line}\n"));
        }
    }

    body.push_str("\n## Response\n\n");
    if record.response.is_empty() {
        body.push_str("(no response recorded)\n");
    } else {
        body.push_str(&record.response);
        body.push('\n');
    }

    let path = run_dir.join("report.md");
    std::fs::write(&path, body).map_err(|e| io_err(&path, e))
}

fn write_log_json(run_dir: &Path, record: &crate::domain::RunRecord) -> Result<(), TaskStoreError> {
    let events: Vec<serde_json::Value> = record
        .execution_log
        .iter()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();
    let body = serde_json::to_string_pretty(&events).expect("Vec<Value> serialization is infallible");
    let path = run_dir.join("log.json");
    std::fs::write(&path, body).map_err(|e| io_err(&path, e))
}

/// Locate the single task file inside a `completed/`/`failed/` run
/// directory, i.e. the one entry that isn't `report.md` or `log.json`.
fn find_run_dir_task_file(run_dir: &Path) -> Result<PathBuf, TaskStoreError> {
    let entries = std::fs::read_dir(run_dir).map_err(|e| io_err(run_dir, e))?;
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name != "report.md" && name != "log.json" {
            return Ok(run_dir.join(name.as_ref()));
        }
    }
    Err(TaskStoreError::NotClaimed(run_dir.display().to_string()))
}

/// Re-enqueue a failed task from its `failed/<ts>_<name>/` run directory
/// back into `tasks/`, appending exactly one `start_movement:` line and one
/// `retry_note:` line (YAML tasks only; Markdown tasks are copied
/// verbatim). The run directory itself is left in place.
pub fn requeue_failed_task(
    takt_dir: &Path,
    run_dir_name: &str,
    start_movement: &str,
    retry_note: &str,
) -> Result<(), TaskStoreError> {
    let run_dir = failed_dir(takt_dir).join(run_dir_name);
    let src = find_run_dir_task_file(&run_dir)?;
    let file_name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TaskStoreError::NotClaimed(run_dir_name.to_string()))?;

    let content = std::fs::read_to_string(&src).map_err(|e| io_err(&src, e))?;
    let is_yaml = matches!(src.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));

    let rewritten = if is_yaml {
        let without_start_movement = remove_yaml_line(&content, "start_movement:");
        let without_retry_note = remove_yaml_line(&without_start_movement, "retry_note:");
        let escaped_note = retry_note.replace('\\', "\\\\").replace('"', "\\\"");
        format!(
            "{}\nstart_movement: \"{}\"\nretry_note: \"{}\"\n",
            without_retry_note.trim_end(),
            start_movement,
            escaped_note
        )
    } else {
        content
    };

    let tasks_dir = tasks_dir(takt_dir);
    std::fs::create_dir_all(&tasks_dir).map_err(|e| io_err(&tasks_dir, e))?;
    let dest = tasks_dir.join(&file_name);
    std::fs::write(&dest, rewritten).map_err(|e| io_err(&dest, e))
}

/// Drop any existing line starting with `prefix` from a YAML document, so a
/// repeated requeue replaces rather than duplicates it.
fn remove_yaml_line(content: &str, prefix: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with(prefix))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn write_task(dir: &Path, name: &str, body: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn sample_record(status: crate::domain::RunStatus) -> crate::domain::RunRecord {
        crate::domain::RunRecord {
            task: "fix the login bug".to_string(),
            piece: "default".to_string(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            status,
            execution_log: Vec::new(),
            report_dir: PathBuf::from("/tmp/reports"),
            response: "all done".to_string(),
            error: None,
        }
    }

    #[test]
    fn list_tasks_skips_format_marker() {
        let root = tempdir().unwrap();
        let tasks = tasks_dir(root.path());
        write_task(&tasks, "TASK-FORMAT", "documentation, not a task");
        write_task(&tasks, "fix-login.yaml", "task: fix the login bug\n");

        let entries = list_tasks(root.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "fix-login.yaml");
    }

    #[test]
    fn claim_next_tasks_zero_is_noop() {
        let root = tempdir().unwrap();
        let tasks = tasks_dir(root.path());
        write_task(&tasks, "fix-login.yaml", "task: fix the login bug\n");

        let claimed = claim_next_tasks(root.path(), 0).unwrap();
        assert!(claimed.is_empty());
    }

    #[test]
    fn complete_task_rejects_failed_status() {
        let root = tempdir().unwrap();
        let tasks = tasks_dir(root.path());
        write_task(&tasks, "fix-login.yaml", "task: fix the login bug\n");

        let mut record = sample_record(crate::domain::RunStatus::Failed);
        record.error = Some("boom".to_string());

        assert!(matches!(
            complete_task(root.path(), "fix-login.yaml", &record),
            Err(TaskStoreError::CompleteCalledOnFailure(_))
        ));
    }

    #[test]
    fn complete_task_creates_run_directory_with_report_and_log() {
        let root = tempdir().unwrap();
        let tasks = tasks_dir(root.path());
        write_task(&tasks, "fix-login.yaml", "task: fix the login bug\n");

        let mut record = sample_record(crate::domain::RunStatus::Completed);
        record.execution_log = vec![r#"{"kind":"workflow:complete"}"#.to_string()];

        complete_task(root.path(), "fix-login.yaml", &record).unwrap();

        let completed = completed_dir(root.path());
        let run_dirs: Vec<_> = std::fs::read_dir(&completed).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(run_dirs.len(), 1);
        let run_dir = run_dirs[0].path();
        assert!(run_dir.file_name().unwrap().to_string_lossy().ends_with("_fix-login"));

        assert!(run_dir.join("fix-login.yaml").exists());
        let report = std::fs::read_to_string(run_dir.join("report.md")).unwrap();
        assert!(report.contains("fix the login bug"));
        assert!(report.contains("**Outcome:** completed"));
        assert!(report.contains("all done"));

        let log = std::fs::read_to_string(run_dir.join("log.json")).unwrap();
        assert!(log.contains("workflow:complete"));

        assert!(!tasks.join("fix-login.yaml").exists());
    }

    #[test]
    fn requeue_failed_task_appends_lines_and_escapes_quotes() {
        let root = tempdir().unwrap();
        let failed_run_dir = failed_dir(root.path()).join("2026-07-28T10-00-00.000_fix-login");
        write_task(&failed_run_dir, "fix-login.yaml", "task: fix the login bug\n");
        write_task(&failed_run_dir, "report.md", "# Task Report\n");
        write_task(&failed_run_dir, "log.json", "[]");

        requeue_failed_task(
            root.path(),
            "2026-07-28T10-00-00.000_fix-login",
            "plan",
            "agent said \"done\" but tests failed",
        )
        .unwrap();

        let requeued = std::fs::read_to_string(tasks_dir(root.path()).join("fix-login.yaml")).unwrap();
        assert!(requeued.contains("start_movement: \"plan\""));
        assert!(requeued.contains("retry_note: \"agent said \\\"done\\\" but tests failed\""));
        assert!(failed_run_dir.join("fix-login.yaml").exists());
    }

    #[test]
    fn requeue_failed_task_renames_to_original_file_stem() {
        let root = tempdir().unwrap();
        let failed_run_dir = failed_dir(root.path()).join("2026-07-28T10-00-00.000_my");
        write_task(&failed_run_dir, "my.yaml", "task: fix\n");

        requeue_failed_task(root.path(), "2026-07-28T10-00-00.000_my", "implement", "fixed \"ENOENT\"").unwrap();

        let requeued = std::fs::read_to_string(tasks_dir(root.path()).join("my.yaml")).unwrap();
        assert!(requeued.contains("task: fix"));
        assert!(requeued.contains("start_movement: \"implement\""));
        assert!(requeued.contains("retry_note: \"fixed \\\"ENOENT\\\"\""));
    }
}
