//! Task domain types
//!
//! A [`Task`] is the unit of dispatch: created by the caller, immutable
//! once handed to the coordinator, referenced by exactly one active QA loop
//! run at a time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::id::generate_id;

/// A unit of work for the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Opaque identifier (e.g. `01a4f2-task-add-oauth`)
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Natural-language description of the work
    pub description: String,

    /// Files the task may touch
    #[serde(rename = "target-files")]
    pub target_files: Vec<String>,

    /// Optional acceptance criteria
    #[serde(rename = "acceptance-criteria")]
    pub acceptance_criteria: Option<String>,

    /// Working-directory override; the configured default applies when
    /// absent
    #[serde(rename = "project-path")]
    pub project_path: Option<PathBuf>,
}

impl Task {
    /// Create a task with a generated ID
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: generate_id("task", &name),
            name,
            description: description.into(),
            target_files: vec![],
            acceptance_criteria: None,
            project_path: None,
        }
    }

    pub fn with_target_files(mut self, files: Vec<String>) -> Self {
        self.target_files = files;
        self
    }

    pub fn with_acceptance_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.acceptance_criteria = Some(criteria.into());
        self
    }

    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }
}

/// Per-invocation context forwarded to a worker
#[derive(Debug, Clone, Default)]
pub struct RunTaskContext {
    /// Directory the worker operates in
    pub working_dir: PathBuf,

    /// Files relevant to the invocation
    pub relevant_files: Vec<String>,

    /// Error text from previous attempts, oldest first
    pub previous_attempts: Vec<String>,
}

/// Structured outcome of one worker invocation
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub success: bool,

    /// Failure description when `success` is false
    pub error: Option<String>,

    /// Work product (e.g. generated text) when the worker produced one
    pub artifact: Option<String>,
}

impl TaskOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            artifact: None,
        }
    }

    pub fn ok_with_artifact(artifact: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            artifact: Some(artifact.into()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            artifact: None,
        }
    }
}
