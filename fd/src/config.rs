//! Forgedaemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main forgedaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default project root for gate runners and analysis
    #[serde(rename = "working-dir")]
    pub working_dir: Option<PathBuf>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// QA loop retry budget and gate sequencing
    pub qa: QaConfig,

    /// Agent pool limits
    pub pool: PoolConfig,

    /// Context budgets and search thresholds
    pub context: ContextConfig,

    /// Repository analysis filters
    pub analysis: AnalysisConfig,

    /// Gate subprocess commands
    pub gates: GatesConfig,

    /// Review gate configuration
    pub review: ReviewConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .forgedaemon.yml
        let local_config = PathBuf::from(".forgedaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/forgedaemon/forgedaemon.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("forgedaemon").join("forgedaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

/// QA loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Retry budget before escalation
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Skip later gates when an earlier gate fails
    #[serde(rename = "stop-on-first-failure")]
    pub stop_on_first_failure: bool,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            stop_on_first_failure: true,
        }
    }
}

/// Agent pool limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum agents alive at once
    #[serde(rename = "max-agents")]
    pub max_agents: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_agents: 4 }
    }
}

/// Context budgets and search thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Total token budget for one fresh context
    #[serde(rename = "max-tokens")]
    pub max_tokens: usize,

    /// Minimum relevance for code-search hits
    #[serde(rename = "min-code-relevance")]
    pub min_code_relevance: f64,

    /// Minimum relevance for memory hits
    #[serde(rename = "min-memory-relevance")]
    pub min_memory_relevance: f64,

    /// Files larger than this (in characters) are skipped
    #[serde(rename = "max-file-size-chars")]
    pub max_file_size_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            min_code_relevance: 0.3,
            min_memory_relevance: 0.3,
            max_file_size_chars: 50_000,
        }
    }
}

/// Repository analysis filters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// File cap for the analysis pipeline
    #[serde(rename = "max-files")]
    pub max_files: usize,

    /// Glob patterns a file must match
    #[serde(rename = "include-patterns")]
    pub include_patterns: Vec<String>,

    /// Glob patterns that exclude a file
    #[serde(rename = "exclude-patterns")]
    pub exclude_patterns: Vec<String>,

    /// Attach doc comments during parsing
    #[serde(rename = "extract-docs")]
    pub extract_docs: bool,

    /// Count cross-file references after parsing
    #[serde(rename = "count-references")]
    pub count_references: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_files: 500,
            include_patterns: vec![],
            exclude_patterns: vec![],
            extract_docs: true,
            count_references: true,
        }
    }
}

/// Commands for the three subprocess gates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatesConfig {
    pub build: BuildGateConfig,
    pub lint: LintGateConfig,
    pub test: TestGateConfig,
}

/// Typechecker gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildGateConfig {
    /// Launcher command
    pub command: String,

    /// Full argv override; when set, `command`/`tsconfig`/flags are ignored
    #[serde(rename = "raw-command")]
    pub raw_command: Option<Vec<String>>,

    /// Path to the tsconfig
    pub tsconfig: String,

    /// Use `--build` for project references
    #[serde(rename = "build-mode")]
    pub build_mode: bool,

    /// Extra arguments appended verbatim
    #[serde(rename = "extra-args")]
    pub extra_args: Vec<String>,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for BuildGateConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            raw_command: None,
            tsconfig: "tsconfig.json".to_string(),
            build_mode: false,
            extra_args: vec![],
            timeout_ms: 120_000,
        }
    }
}

impl BuildGateConfig {
    /// Full argument vector for the typechecker invocation.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "tsc".to_string(),
            "--noEmit".to_string(),
            "--pretty".to_string(),
            "false".to_string(),
        ];
        if self.build_mode {
            args.push("--build".to_string());
        }
        args.push("--project".to_string());
        args.push(self.tsconfig.clone());
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Linter gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintGateConfig {
    /// Launcher command
    pub command: String,

    /// Full argv override; when set, the other fields are ignored
    #[serde(rename = "raw-command")]
    pub raw_command: Option<Vec<String>>,

    /// File extensions to lint
    pub extensions: Vec<String>,

    /// Pass `--fix`
    pub fix: bool,

    /// Pass `--max-warnings`
    #[serde(rename = "max-warnings")]
    pub max_warnings: Option<u32>,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LintGateConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            raw_command: None,
            extensions: vec![".ts".to_string(), ".tsx".to_string()],
            fix: false,
            max_warnings: None,
            timeout_ms: 120_000,
        }
    }
}

impl LintGateConfig {
    /// Full argument vector for the linter invocation; the JSON formatter
    /// is always appended so output stays parseable.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "eslint".to_string(),
            ".".to_string(),
            "--ext".to_string(),
            self.extensions.join(","),
        ];
        if self.fix {
            args.push("--fix".to_string());
        }
        if let Some(max) = self.max_warnings {
            args.push("--max-warnings".to_string());
            args.push(max.to_string());
        }
        args.push("--format".to_string());
        args.push("json".to_string());
        args
    }
}

/// Test runner gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestGateConfig {
    /// Launcher command
    pub command: String,

    /// Full argv override; when set, the other fields are ignored
    #[serde(rename = "raw-command")]
    pub raw_command: Option<Vec<String>>,

    /// Collect coverage
    pub coverage: bool,

    /// Test-name pattern filter
    pub pattern: Option<String>,

    /// Explicit test file list
    pub files: Vec<String>,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for TestGateConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            raw_command: None,
            coverage: false,
            pattern: None,
            files: vec![],
            timeout_ms: 300_000,
        }
    }
}

impl TestGateConfig {
    /// Full argument vector for the test runner invocation.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["vitest".to_string(), "run".to_string(), "--reporter=json".to_string()];
        if self.coverage {
            args.push("--coverage".to_string());
        }
        if let Some(pattern) = &self.pattern {
            args.push("-t".to_string());
            args.push(pattern.clone());
        }
        args.extend(self.files.iter().cloned());
        args
    }
}

/// Review gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Diff truncation threshold in characters
    #[serde(rename = "max-diff-size")]
    pub max_diff_size: usize,

    /// Extra numbered criteria appended to the review system prompt
    #[serde(rename = "additional-criteria")]
    pub additional_criteria: Vec<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_diff_size: 50_000,
            additional_criteria: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.qa.max_iterations, 50);
        assert!(config.qa.stop_on_first_failure);
        assert_eq!(config.analysis.max_files, 500);
        assert_eq!(config.review.max_diff_size, 50_000);
        assert_eq!(config.pool.max_agents, 4);
    }

    #[test]
    fn test_build_args_include_no_emit() {
        let args = BuildGateConfig::default().args();
        assert!(args.contains(&"--noEmit".to_string()));
        assert!(args.contains(&"--pretty".to_string()));
        assert!(args.contains(&"tsconfig.json".to_string()));
        assert!(!args.contains(&"--build".to_string()));
    }

    #[test]
    fn test_build_args_build_mode() {
        let config = BuildGateConfig {
            build_mode: true,
            ..Default::default()
        };
        assert!(config.args().contains(&"--build".to_string()));
    }

    #[test]
    fn test_lint_args_always_json() {
        let config = LintGateConfig {
            fix: true,
            max_warnings: Some(10),
            ..Default::default()
        };
        let args = config.args();
        assert!(args.contains(&"--fix".to_string()));
        assert!(args.contains(&"--max-warnings".to_string()));
        let format_pos = args.iter().position(|a| a == "--format").unwrap();
        assert_eq!(args[format_pos + 1], "json");
    }

    #[test]
    fn test_test_args() {
        let config = TestGateConfig {
            pattern: Some("login".to_string()),
            files: vec!["src/auth.test.ts".to_string()],
            ..Default::default()
        };
        let args = config.args();
        assert_eq!(args[1], "run");
        assert!(args.contains(&"--reporter=json".to_string()));
        assert!(args.contains(&"-t".to_string()));
        assert!(args.contains(&"src/auth.test.ts".to_string()));
    }

    #[test]
    fn test_yaml_round_trip() {
        let yaml = "qa:\n  max-iterations: 3\n  stop-on-first-failure: false\nreview:\n  max-diff-size: 1000\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.qa.max_iterations, 3);
        assert!(!config.qa.stop_on_first_failure);
        assert_eq!(config.review.max_diff_size, 1000);
        // untouched sections keep defaults
        assert_eq!(config.pool.max_agents, 4);
    }
}
