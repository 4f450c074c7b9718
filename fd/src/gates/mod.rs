//! Quality gates: build, lint, test, review
//!
//! Each gate wraps one subprocess or LLM call and parses its output into
//! structured results. Nothing in here throws across the gate boundary:
//! spawn failures, timeouts, and malformed output all become error entries
//! on a failed result.

mod build;
mod lint;
pub mod process;
mod review;

pub use build::BuildRunner;
pub use lint::LintRunner;
pub use review::ReviewRunner;
pub use test::TestRunner;

use serde::{Deserialize, Serialize};

/// Error code for a process that could not be spawned or timed out.
pub const SPAWN_ERROR: &str = "SPAWN_ERROR";

/// Error code for unparseable gate output.
pub const PARSE_ERROR: &str = "PARSE_ERROR";

/// Error code for a gate result that violated its own contract.
pub const ASSERTION_ERROR: &str = "ASSERTION_ERROR";

/// One of the four quality gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    Build,
    Lint,
    Test,
    Review,
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Gate::Build => "build",
            Gate::Lint => "lint",
            Gate::Test => "test",
            Gate::Review => "review",
        };
        write!(f, "{}", s)
    }
}

/// Severity of a gate finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single structured finding from a gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Gate that produced the finding
    pub gate: Gate,

    pub severity: Severity,

    pub message: String,

    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,

    /// Tool-specific code (`TS2322`, a lint rule id, or one of the
    /// gate-level codes)
    pub code: Option<String>,

    /// QA iteration in which the finding was produced
    pub iteration: u32,

    /// Optional repair hint
    pub suggestion: Option<String>,
}

impl ErrorEntry {
    pub fn new(gate: Gate, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            gate,
            severity,
            message: message.into(),
            file: None,
            line: None,
            column: None,
            code: None,
            iteration: 0,
            suggestion: None,
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = iteration;
        self
    }

    /// A spawn-failure entry (launch failure or timeout).
    pub fn spawn_failure(gate: Gate, message: impl Into<String>, iteration: u32) -> Self {
        Self::new(gate, Severity::Error, message)
            .with_code(SPAWN_ERROR)
            .with_iteration(iteration)
    }

    /// Human-readable single-line rendering for repair prompts.
    pub fn render(&self) -> String {
        let mut line = format!("[{}]", self.gate);
        if let Some(file) = &self.file {
            line.push(' ');
            line.push_str(file);
            if let Some(l) = self.line {
                line.push_str(&format!(":{}", l));
                if let Some(c) = self.column {
                    line.push_str(&format!(":{}", c));
                }
            }
        }
        if let Some(code) = &self.code {
            line.push_str(&format!(" {}", code));
        }
        line.push_str(&format!(" {}", self.message));
        line
    }
}

/// Build (typecheck) gate result
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub success: bool,
    pub errors: Vec<ErrorEntry>,
    pub warnings: Vec<ErrorEntry>,
    pub duration_ms: u64,
}

/// Lint gate result
#[derive(Debug, Clone, Default)]
pub struct LintResult {
    pub success: bool,
    pub errors: Vec<ErrorEntry>,
    pub warnings: Vec<ErrorEntry>,

    /// Findings the linter reports as auto-fixable
    pub fixable_count: u32,
}

/// Test gate result
#[derive(Debug, Clone, Default)]
pub struct TestResult {
    pub success: bool,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub errors: Vec<ErrorEntry>,
    pub duration_ms: u64,
}

/// Review gate result
#[derive(Debug, Clone, Default)]
pub struct ReviewResult {
    pub approved: bool,
    pub comments: Vec<String>,
    pub suggestions: Vec<String>,
    pub blockers: Vec<String>,
}

/// Tagged union over the four gate results
#[derive(Debug, Clone)]
pub enum GateResult {
    Build(BuildResult),
    Lint(LintResult),
    Test(TestResult),
    Review(ReviewResult),
}

impl GateResult {
    pub fn gate(&self) -> Gate {
        match self {
            GateResult::Build(_) => Gate::Build,
            GateResult::Lint(_) => Gate::Lint,
            GateResult::Test(_) => Gate::Test,
            GateResult::Review(_) => Gate::Review,
        }
    }

    /// Whether the gate passed.
    pub fn passed(&self) -> bool {
        match self {
            GateResult::Build(r) => r.success,
            GateResult::Lint(r) => r.success,
            GateResult::Test(r) => r.success,
            GateResult::Review(r) => r.approved,
        }
    }

    /// Human-readable error lines for the repair channel.
    pub fn error_lines(&self) -> Vec<String> {
        match self {
            GateResult::Build(r) => r.errors.iter().map(ErrorEntry::render).collect(),
            GateResult::Lint(r) => r.errors.iter().map(ErrorEntry::render).collect(),
            GateResult::Test(r) => r.errors.iter().map(ErrorEntry::render).collect(),
            GateResult::Review(r) => r.blockers.iter().map(|b| format!("[review] {}", b)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_render_with_location() {
        let entry = ErrorEntry::new(Gate::Build, Severity::Error, "Type mismatch")
            .with_location("src/a.ts", 10, 5)
            .with_code("TS2322");
        assert_eq!(entry.render(), "[build] src/a.ts:10:5 TS2322 Type mismatch");
    }

    #[test]
    fn test_entry_render_bare() {
        let entry = ErrorEntry::new(Gate::Test, Severity::Error, "1 test failed");
        assert_eq!(entry.render(), "[test] 1 test failed");
    }

    #[test]
    fn test_spawn_failure_code_and_iteration() {
        let entry = ErrorEntry::spawn_failure(Gate::Lint, "spawn failed", 3);
        assert_eq!(entry.code.as_deref(), Some(SPAWN_ERROR));
        assert_eq!(entry.iteration, 3);
        assert_eq!(entry.gate, Gate::Lint);
    }

    #[test]
    fn test_gate_result_passed() {
        assert!(GateResult::Build(BuildResult {
            success: true,
            ..Default::default()
        })
        .passed());
        assert!(!GateResult::Review(ReviewResult::default()).passed());
    }

    #[test]
    fn test_gate_display() {
        assert_eq!(Gate::Build.to_string(), "build");
        assert_eq!(Gate::Review.to_string(), "review");
    }
}
