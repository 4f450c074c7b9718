//! Build (typecheck) gate
//!
//! Runs the typechecker in no-emit mode and scans its output line-wise for
//! `<file>(<line>,<col>): error <code>: <message>` diagnostics. Success is
//! decided by the exit code alone; the parsed entries describe why.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use super::process::{CommandSpec, run_command};
use super::{BuildResult, ErrorEntry, Gate, Severity};
use crate::config::BuildGateConfig;

static RE_DIAGNOSTIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\((\d+),(\d+)\): (error|warning) ([A-Za-z]+\d+): (.+)$").unwrap());

/// Typecheck gate runner
pub struct BuildRunner {
    spec: CommandSpec,
    iteration: u32,
}

impl BuildRunner {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec, iteration: 0 }
    }

    pub fn from_config(config: &BuildGateConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let spec = match &config.raw_command {
            Some(raw) if !raw.is_empty() => CommandSpec::new(&raw[0], raw[1..].to_vec(), timeout),
            _ => CommandSpec::new(&config.command, config.args(), timeout),
        };
        Self::new(spec)
    }

    /// Set the QA iteration stamped on every entry this runner emits.
    pub fn set_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    pub async fn run(&self, working_dir: &Path) -> BuildResult {
        debug!(?working_dir, iteration = self.iteration, "BuildRunner::run: called");

        let output = match run_command(&self.spec, working_dir).await {
            Ok(output) => output,
            Err(spawn) => {
                info!(error = %spawn.message, "Build gate spawn failure");
                return BuildResult {
                    success: false,
                    errors: vec![ErrorEntry::spawn_failure(Gate::Build, spawn.message, self.iteration)],
                    warnings: vec![],
                    duration_ms: spawn.duration_ms,
                };
            }
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for line in output.stdout.lines().chain(output.stderr.lines()) {
            if let Some(entry) = self.parse_line(line) {
                match entry.severity {
                    Severity::Error => errors.push(entry),
                    Severity::Warning => warnings.push(entry),
                }
            }
        }

        let success = output.succeeded();
        info!(
            success,
            errors = errors.len(),
            warnings = warnings.len(),
            duration_ms = output.duration_ms,
            "Build gate complete"
        );

        BuildResult {
            success,
            errors,
            warnings,
            duration_ms: output.duration_ms,
        }
    }

    fn parse_line(&self, line: &str) -> Option<ErrorEntry> {
        let caps = RE_DIAGNOSTIC.captures(line.trim_end())?;
        let severity = if &caps[4] == "error" {
            Severity::Error
        } else {
            Severity::Warning
        };
        Some(
            ErrorEntry::new(Gate::Build, severity, &caps[6])
                .with_location(&caps[1], caps[2].parse().ok()?, caps[3].parse().ok()?)
                .with_code(&caps[5])
                .with_iteration(self.iteration),
        )
    }
}
