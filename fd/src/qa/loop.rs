//! Retry-with-repair state machine over the four gates
//!
//! One loop drives one task: gates run in the fixed order
//! build -> lint -> test -> review, failures feed accumulated error text
//! back to a coder agent, and the next iteration re-runs the gates to
//! measure actual progress. The loop is a sequential driver; concurrency
//! lives above it (many loops share one pool) and below it (each gate's
//! subprocess).
//!
//! Nothing below this module may crash it: gate runners convert every
//! downstream failure into structured data, and escalation is the normal
//! terminal state of a failed run, not an exception.

use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Result, eyre};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::{RunTaskContext, Task};
use crate::gates::{BuildResult, BuildRunner, LintResult, LintRunner, ReviewResult, ReviewRunner, TestResult, TestRunner};
use crate::pool::{AgentKind, AgentPool};

/// QA loop configuration
#[derive(Debug, Clone)]
pub struct QaLoopConfig {
    /// Retry budget before escalation
    pub max_iterations: u32,

    /// Skip later gates once an earlier gate fails
    pub stop_on_first_failure: bool,

    /// Default working directory; a task's project path overrides it
    pub working_dir: PathBuf,
}

impl Default for QaLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            stop_on_first_failure: true,
            working_dir: PathBuf::from("."),
        }
    }
}

/// Terminal outcome of one QA loop run
#[derive(Debug, Clone)]
pub struct QaLoopResult {
    pub success: bool,

    /// True exactly when the run failed by exhausting its budget
    pub escalated: bool,

    /// Iterations executed; never exceeds the configured maximum
    pub iterations: u32,

    pub last_build: Option<BuildResult>,
    pub last_lint: Option<LintResult>,
    pub last_test: Option<TestResult>,
    pub last_review: Option<ReviewResult>,

    /// Termination reason for failed runs
    pub reason: Option<String>,
}

/// Drives one task through the gates until convergence or escalation
pub struct QaLoop {
    config: QaLoopConfig,
    build: BuildRunner,
    lint: LintRunner,
    test: TestRunner,
    review: ReviewRunner,
    pool: Option<Arc<AgentPool>>,

    /// Pre-rendered context for the initial generate call
    generate_prompt: Option<String>,
}

impl QaLoop {
    pub fn new(
        config: QaLoopConfig,
        build: BuildRunner,
        lint: LintRunner,
        test: TestRunner,
        review: ReviewRunner,
    ) -> Self {
        Self {
            config,
            build,
            lint,
            test,
            review,
            pool: None,
            generate_prompt: None,
        }
    }

    /// Attach an agent pool; without one the loop never attempts repair.
    pub fn with_pool(mut self, pool: Arc<AgentPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Use a rendered task context as the initial generate prompt.
    pub fn with_generate_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.generate_prompt = Some(prompt.into());
        self
    }

    pub async fn run(&mut self, task: &Task) -> Result<QaLoopResult> {
        self.run_with_cancel(task, None).await
    }

    /// Run the loop; the cancel flag is honored between gates, and a
    /// cancelled run returns an error rather than a result.
    pub async fn run_with_cancel(
        &mut self,
        task: &Task,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<QaLoopResult> {
        let working_dir = task.project_path.clone().unwrap_or_else(|| self.config.working_dir.clone());
        debug!(task_id = %task.id, ?working_dir, max_iterations = self.config.max_iterations, "QaLoop::run: called");
        info!(
            "QA loop starting for {} (max_iterations: {}, stop_on_first_failure: {})",
            task.id, self.config.max_iterations, self.config.stop_on_first_failure
        );

        let mut previous_attempts: Vec<String> = Vec::new();

        // one-shot generate before iteration begins
        if self.pool.is_some() {
            let description = self.generate_prompt.clone().unwrap_or_else(|| task.description.clone());
            self.invoke_coder(task, description, &working_dir, &previous_attempts).await;
        }

        let mut last_build: Option<BuildResult> = None;
        let mut last_lint: Option<LintResult> = None;
        let mut last_test: Option<TestResult> = None;
        let mut last_review: Option<ReviewResult> = None;

        for iteration in 1..=self.config.max_iterations {
            debug!(task_id = %task.id, iteration, "QaLoop::run: iteration start");
            self.check_cancel(&cancel)?;

            self.build.set_iteration(iteration);
            self.lint.set_iteration(iteration);
            self.test.set_iteration(iteration);
            self.review.set_iteration(iteration);

            let mut all_passed = true;
            let mut error_details: Vec<String> = Vec::new();

            // build
            let result = self.build.run(&working_dir).await;
            last_build = Some(result.clone());
            if !result.success {
                all_passed = false;
                error_details.extend(result.errors.iter().map(|e| e.render()));
                debug!(task_id = %task.id, iteration, errors = result.errors.len(), "QaLoop::run: build failed");
            }

            // lint
            if all_passed || !self.config.stop_on_first_failure {
                self.check_cancel(&cancel)?;
                let result = self.lint.run(&working_dir).await;
                if !result.success {
                    all_passed = false;
                    error_details.extend(result.errors.iter().map(|e| e.render()));
                    debug!(task_id = %task.id, iteration, "QaLoop::run: lint failed");
                }
                last_lint = Some(result);
            }

            // test
            if all_passed || !self.config.stop_on_first_failure {
                self.check_cancel(&cancel)?;
                let result = self.test.run(&working_dir).await;
                if !result.success {
                    all_passed = false;
                    error_details.extend(result.errors.iter().map(|e| e.render()));
                    if result.errors.is_empty() {
                        error_details.push(format!("[test] {} tests failed", result.failed));
                    }
                    debug!(task_id = %task.id, iteration, failed = result.failed, "QaLoop::run: tests failed");
                }
                last_test = Some(result);
            }

            // review
            if all_passed || !self.config.stop_on_first_failure {
                self.check_cancel(&cancel)?;
                let result = self.review.run(task).await;
                if !result.approved {
                    all_passed = false;
                    error_details.extend(result.blockers.iter().map(|b| format!("[review] {}", b)));
                    debug!(task_id = %task.id, iteration, blockers = result.blockers.len(), "QaLoop::run: review rejected");
                }
                last_review = Some(result);
            }

            if all_passed {
                info!("QA loop for {} converged after {} iterations", task.id, iteration);
                return Ok(QaLoopResult {
                    success: true,
                    escalated: false,
                    iterations: iteration,
                    last_build,
                    last_lint,
                    last_test,
                    last_review,
                    reason: None,
                });
            }

            // repair: only under stop-on-first-failure, and its outcome
            // never short-circuits the loop; the next iteration's gates are
            // the ground truth
            if self.pool.is_some() && self.config.stop_on_first_failure {
                let description = format!(
                    "Fix the following errors:\n{}\n\nOriginal task: {}",
                    error_details.join("\n"),
                    task.description
                );
                self.invoke_coder(task, description, &working_dir, &previous_attempts).await;
            }

            previous_attempts.push(error_details.join("\n"));
        }

        info!(
            "QA loop for {} exhausted {} iterations; escalating",
            task.id, self.config.max_iterations
        );
        Ok(QaLoopResult {
            success: false,
            escalated: true,
            iterations: self.config.max_iterations,
            last_build,
            last_lint,
            last_test,
            last_review,
            reason: Some("Max QA iterations exceeded".to_string()),
        })
    }

    /// Invoke the coder through the pool. Resource errors and worker
    /// crashes degrade to log lines: they count as a failed repair, not a
    /// failed loop.
    async fn invoke_coder(&self, task: &Task, description: String, working_dir: &std::path::Path, previous_attempts: &[String]) {
        let Some(pool) = &self.pool else { return };
        debug!(task_id = %task.id, "QaLoop::invoke_coder: called");

        let agent = match pool.acquire(AgentKind::Coder).await {
            Ok(agent) => agent,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "No coder available; skipping invocation");
                return;
            }
        };

        let mut coder_task = task.clone();
        coder_task.description = description;
        let ctx = RunTaskContext {
            working_dir: working_dir.to_path_buf(),
            relevant_files: task.target_files.clone(),
            previous_attempts: previous_attempts.to_vec(),
        };

        match pool.run_task(&agent, &coder_task, &ctx).await {
            Ok(outcome) if outcome.success => {
                debug!(task_id = %task.id, agent_id = %agent.id, "QaLoop::invoke_coder: coder succeeded");
            }
            Ok(outcome) => {
                warn!(
                    task_id = %task.id,
                    agent_id = %agent.id,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "Coder reported failure"
                );
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Coder crashed during invocation");
            }
        }
    }

    fn check_cancel(&self, cancel: &Option<watch::Receiver<bool>>) -> Result<()> {
        if let Some(cancel) = cancel
            && *cancel.borrow()
        {
            info!("QA loop cancelled; no further gates will start");
            return Err(eyre!("QA loop cancelled"));
        }
        Ok(())
    }
}
