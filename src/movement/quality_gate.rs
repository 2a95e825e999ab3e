//! Quality gate execution — shell commands run after a movement's phases
//! complete, grounded on `loop/validation.rs::run_validation`: spawn,
//! enforce a timeout, report exit code and captured output.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

const GATE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct QualityGateResult {
    pub command: String,
    pub passed: bool,
    pub stdout: String,
    pub stderr: String,
}

pub async fn run_quality_gate(command: &str, cwd: &Path) -> QualityGateResult {
    debug!(command, cwd = %cwd.display(), "run_quality_gate: called");

    let outcome = tokio::time::timeout(
        GATE_TIMEOUT,
        Command::new("sh").arg("-c").arg(command).current_dir(cwd).output(),
    )
    .await;

    match outcome {
        Ok(Ok(output)) => QualityGateResult {
            command: command.to_string(),
            passed: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Ok(Err(err)) => QualityGateResult {
            command: command.to_string(),
            passed: false,
            stdout: String::new(),
            stderr: format!("failed to spawn: {err}"),
        },
        Err(_) => QualityGateResult {
            command: command.to_string(),
            passed: false,
            stdout: String::new(),
            stderr: format!("quality gate timed out after {GATE_TIMEOUT:?}"),
        },
    }
}

pub async fn run_all(commands: &[String], cwd: &Path) -> Vec<QualityGateResult> {
    let mut results = Vec::with_capacity(commands.len());
    for command in commands {
        results.push(run_quality_gate(command, cwd).await);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_success_and_failure() {
        let cwd = std::env::current_dir().unwrap();
        let ok = run_quality_gate("true", &cwd).await;
        assert!(ok.passed);

        let failing = run_quality_gate("false", &cwd).await;
        assert!(!failing.passed);
    }
}
