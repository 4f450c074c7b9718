//! Lint gate
//!
//! Runs the linter with its JSON reporter and parses the per-file result
//! records. Warnings never fail the gate; malformed reporter output becomes
//! a single parse-error entry.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use super::process::{CommandSpec, run_command};
use super::{ErrorEntry, Gate, LintResult, PARSE_ERROR, Severity};
use crate::config::LintGateConfig;

/// Permissive mirror of one per-file reporter record; unknown fields are
/// ignored so reporter version drift cannot break parsing.
#[derive(Debug, Deserialize)]
struct FileReport {
    #[serde(rename = "filePath", default)]
    file_path: String,

    #[serde(default)]
    messages: Vec<FileMessage>,

    #[serde(rename = "fixableErrorCount", default)]
    fixable_error_count: u32,

    #[serde(rename = "fixableWarningCount", default)]
    fixable_warning_count: u32,
}

#[derive(Debug, Deserialize)]
struct FileMessage {
    /// 1 = warning, 2 = error
    #[serde(default)]
    severity: u8,

    #[serde(rename = "ruleId", default)]
    rule_id: Option<String>,

    #[serde(default)]
    line: Option<u32>,

    #[serde(default)]
    column: Option<u32>,

    #[serde(default)]
    message: String,
}

/// Lint gate runner
pub struct LintRunner {
    spec: CommandSpec,
    iteration: u32,
}

impl LintRunner {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec, iteration: 0 }
    }

    pub fn from_config(config: &LintGateConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let spec = match &config.raw_command {
            Some(raw) if !raw.is_empty() => CommandSpec::new(&raw[0], raw[1..].to_vec(), timeout),
            _ => CommandSpec::new(&config.command, config.args(), timeout),
        };
        Self::new(spec)
    }

    pub fn set_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    pub async fn run(&self, working_dir: &Path) -> LintResult {
        debug!(?working_dir, iteration = self.iteration, "LintRunner::run: called");

        let output = match run_command(&self.spec, working_dir).await {
            Ok(output) => output,
            Err(spawn) => {
                info!(error = %spawn.message, "Lint gate spawn failure");
                return LintResult {
                    success: false,
                    errors: vec![ErrorEntry::spawn_failure(Gate::Lint, spawn.message, self.iteration)],
                    warnings: vec![],
                    fixable_count: 0,
                };
            }
        };

        let reports: Vec<FileReport> = match serde_json::from_str(output.stdout.trim()) {
            Ok(reports) => reports,
            Err(e) => {
                info!(error = %e, "Lint gate output unparseable");
                return LintResult {
                    success: false,
                    errors: vec![
                        ErrorEntry::new(Gate::Lint, Severity::Error, format!("Failed to parse linter output: {}", e))
                            .with_code(PARSE_ERROR)
                            .with_iteration(self.iteration),
                    ],
                    warnings: vec![],
                    fixable_count: 0,
                };
            }
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut fixable_count = 0u32;

        for report in reports {
            fixable_count += report.fixable_error_count + report.fixable_warning_count;
            for message in report.messages {
                let severity = if message.severity == 2 {
                    Severity::Error
                } else {
                    Severity::Warning
                };
                let mut entry = ErrorEntry::new(Gate::Lint, severity, message.message).with_iteration(self.iteration);
                entry.file = Some(report.file_path.clone());
                entry.line = message.line;
                entry.column = message.column;
                entry.code = message.rule_id;
                match severity {
                    Severity::Error => errors.push(entry),
                    Severity::Warning => warnings.push(entry),
                }
            }
        }

        // warnings do not fail the gate
        let success = errors.is_empty();
        info!(
            success,
            errors = errors.len(),
            warnings = warnings.len(),
            fixable_count,
            "Lint gate complete"
        );

        LintResult {
            success,
            errors,
            warnings,
            fixable_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn shell_runner(script: &str) -> LintRunner {
        LintRunner::new(CommandSpec::shell(script, Duration::from_secs(10)))
    }

    #[tokio::test]
    async fn test_empty_array_passes() {
        let temp = tempdir().unwrap();
        let result = shell_runner("echo '[]'").run(temp.path()).await;

        assert!(result.success);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.fixable_count, 0);
    }

    #[tokio::test]
    async fn test_errors_and_warnings_partitioned() {
        let temp = tempdir().unwrap();
        let json = r#"[{"filePath":"src/a.ts","messages":[
            {"severity":2,"ruleId":"no-unused-vars","line":3,"column":7,"message":"x is unused"},
            {"severity":1,"ruleId":"prefer-const","line":9,"column":1,"message":"use const"}
        ],"fixableErrorCount":1,"fixableWarningCount":2}]"#;
        let script = format!("echo '{}'; exit 1", json.replace('\n', " "));
        let result = shell_runner(&script).run(temp.path()).await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.fixable_count, 3);

        let error = &result.errors[0];
        assert_eq!(error.file.as_deref(), Some("src/a.ts"));
        assert_eq!(error.code.as_deref(), Some("no-unused-vars"));
        assert_eq!(error.line, Some(3));
    }

    #[tokio::test]
    async fn test_warnings_only_still_passes() {
        let temp = tempdir().unwrap();
        let json = r#"[{"filePath":"src/a.ts","messages":[{"severity":1,"message":"style"}]}]"#;
        let result = shell_runner(&format!("echo '{}'", json)).run(temp.path()).await;

        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_output_single_parse_error() {
        let temp = tempdir().unwrap();
        let result = shell_runner("echo 'not json at all'; exit 2").run(temp.path()).await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code.as_deref(), Some(PARSE_ERROR));
    }

    #[tokio::test]
    async fn test_unknown_fields_ignored() {
        let temp = tempdir().unwrap();
        let json = r#"[{"filePath":"a.ts","messages":[],"errorCount":0,"warningCount":0,"usedDeprecatedRules":[]}]"#;
        let result = shell_runner(&format!("echo '{}'", json)).run(temp.path()).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let temp = tempdir().unwrap();
        let runner = LintRunner::new(CommandSpec::new("no-such-linter", vec![], Duration::from_secs(10)));
        let result = runner.run(temp.path()).await;
        assert!(!result.success);
        assert_eq!(result.errors[0].code.as_deref(), Some(super::super::SPAWN_ERROR));
    }
}
