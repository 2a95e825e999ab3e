//! JSONL execution log — one line per event, in emission order, used to
//! populate a `RunRecord.execution_log` and for post-hoc replay.

use std::io::Write as _;
use std::path::Path;

use super::types::PieceEvent;

pub fn append_event(log_path: &Path, event: &PieceEvent) -> std::io::Result<()> {
    let line = serde_json::to_string(event).expect("PieceEvent serialization is infallible");

    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(file, "{line}")
}

pub fn read_execution_log(log_path: &Path) -> std::io::Result<Vec<PieceEvent>> {
    let content = std::fs::read_to_string(log_path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EngineState;
    use tempfile::tempdir;

    #[test]
    fn roundtrips_appended_events() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("log.jsonl");

        append_event(
            &log_path,
            &PieceEvent::WorkflowComplete {
                run_id: "run-1".to_string(),
                state: EngineState::new(),
            },
        )
        .unwrap();

        let events = read_execution_log(&log_path).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }
}
