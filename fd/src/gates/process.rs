//! Shared subprocess shape for gate runners
//!
//! Every subprocess gate spawns the same way: a command with arguments in a
//! working directory under a timeout, stdout and stderr accumulated
//! independently. Launch failures and timeouts surface as a [`SpawnError`];
//! a timed-out process reports `ETIMEDOUT` so it is distinguishable in the
//! message while keeping the same error shape.

use std::path::Path;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// A fully specified gate command
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Convenience for tests and ad-hoc commands: run through `sh -c`.
    pub fn shell(script: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.into()],
            timeout,
        }
    }
}

/// Captured output of a finished gate command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// The process could not produce output: launch failure or timeout
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SpawnError {
    pub message: String,
    pub duration_ms: u64,
}

/// Run a gate command to completion.
pub async fn run_command(spec: &CommandSpec, working_dir: &Path) -> Result<CommandOutput, SpawnError> {
    debug!(program = %spec.program, args = ?spec.args, ?working_dir, timeout_ms = spec.timeout.as_millis() as u64, "run_command: called");
    let start = Instant::now();

    let output = tokio::time::timeout(
        spec.timeout,
        tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(working_dir)
            .kill_on_drop(true)
            .output(),
    )
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;

    match output {
        Ok(Ok(output)) => {
            let exit_code = output.status.code().unwrap_or(-1);
            debug!(exit_code, duration_ms, "run_command: completed");
            Ok(CommandOutput {
                exit_code,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                duration_ms,
            })
        }
        Ok(Err(e)) => {
            debug!(error = %e, "run_command: spawn failed");
            Err(SpawnError {
                message: format!("Failed to spawn {}: {}", spec.program, e),
                duration_ms,
            })
        }
        Err(_) => {
            debug!(duration_ms, "run_command: timed out");
            Err(SpawnError {
                message: format!(
                    "{} timed out after {}ms (ETIMEDOUT)",
                    spec.program,
                    spec.timeout.as_millis()
                ),
                duration_ms,
            })
        }
    }
}
