//! Coordinator - top-level work dispatch
//!
//! The coordinator is an actor: it owns the agent pool and the context
//! manager, receives requests over a channel, and runs one QA loop per
//! submitted task as its own tokio task. Multiple loops run concurrently
//! over the shared pool; the coordinator itself only routes messages and
//! keeps the books.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::handle::CoordinatorHandle;
use super::messages::{CoordRequest, CoordinatorMetrics, TaskDisposition};
use crate::config::Config;
use crate::context::{AgentContextIntegration, ContextBuilder, ContextManager, ContextOptions, GrepCodeMemory};
use crate::domain::Task;
use crate::gates::{BuildRunner, LintRunner, ReviewRunner, TestRunner};
use crate::llm::LlmClient;
use crate::pool::{AgentPool, LlmCoderWorker};
use crate::qa::{QaLoop, QaLoopConfig};
use crate::vcs::{GitVcs, Vcs};

/// Default channel capacity for coordinator requests.
const CHANNEL_CAPACITY: usize = 64;

struct ActiveTask {
    cancel_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

/// Top-level orchestrator actor
pub struct Coordinator {
    config: Config,
    llm: Arc<dyn LlmClient>,
    vcs_override: Option<Arc<dyn Vcs>>,

    pool: Arc<AgentPool>,
    contexts: Arc<AgentContextIntegration>,

    rx: mpsc::Receiver<CoordRequest>,
    tx: mpsc::Sender<CoordRequest>,

    active: HashMap<String, ActiveTask>,
    metrics: CoordinatorMetrics,
}

impl Coordinator {
    /// Build a coordinator with its pool and context plumbing.
    pub fn new(config: Config, llm: Arc<dyn LlmClient>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let working_dir = config.working_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let pool = Arc::new(AgentPool::new(
            config.pool.clone(),
            Arc::new(LlmCoderWorker::new(llm.clone())),
        ));

        let builder = ContextBuilder::new(&working_dir, config.context.clone(), config.analysis.clone())
            .with_code_memory(Arc::new(GrepCodeMemory::new(&working_dir)));
        let manager = Arc::new(ContextManager::new(builder));
        let contexts = Arc::new(AgentContextIntegration::new(manager, false));

        Self {
            config,
            llm,
            vcs_override: None,
            pool,
            contexts,
            rx,
            tx,
            active: HashMap::new(),
            metrics: CoordinatorMetrics::default(),
        }
    }

    /// Replace the per-task git VCS with a fixed implementation (tests).
    pub fn with_vcs(mut self, vcs: Arc<dyn Vcs>) -> Self {
        self.vcs_override = Some(vcs);
        self
    }

    /// Handle for submitting work; clone freely.
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone())
    }

    /// Run the actor until shutdown. Consumes self; communicate through a
    /// [`CoordinatorHandle`].
    pub async fn run(mut self) {
        info!("Coordinator started");
        while let Some(request) = self.rx.recv().await {
            match request {
                CoordRequest::Submit { task, reply_tx } => {
                    debug!(task_id = %task.id, "Coordinator: submit");
                    self.metrics.submitted += 1;
                    self.dispatch(task, reply_tx);
                }
                CoordRequest::Cancel { task_id } => {
                    debug!(%task_id, "Coordinator: cancel");
                    if let Some(active) = self.active.get(&task_id) {
                        let _ = active.cancel_tx.send(true);
                    } else {
                        warn!(%task_id, "Cancel for unknown task");
                    }
                }
                CoordRequest::Metrics { reply_tx } => {
                    let mut metrics = self.metrics;
                    metrics.active = self.active.len();
                    let _ = reply_tx.send(metrics);
                }
                CoordRequest::TaskDone { task_id, disposition } => {
                    debug!(%task_id, ?disposition, "Coordinator: task done");
                    if let Some(active) = self.active.remove(&task_id) {
                        drop(active.handle);
                    }
                    match disposition {
                        TaskDisposition::Completed => self.metrics.completed += 1,
                        TaskDisposition::Escalated => self.metrics.escalated += 1,
                        TaskDisposition::Cancelled => self.metrics.cancelled += 1,
                        TaskDisposition::Failed => self.metrics.failed += 1,
                    }
                }
                CoordRequest::Shutdown => {
                    info!(active = self.active.len(), "Coordinator shutting down");
                    for (task_id, active) in &self.active {
                        debug!(%task_id, "Coordinator: cancelling on shutdown");
                        let _ = active.cancel_tx.send(true);
                    }
                    for (_, active) in self.active.drain() {
                        let _ = active.handle.await;
                    }
                    self.pool.shutdown().await;
                    break;
                }
            }
        }
        info!("Coordinator stopped");
    }

    /// Spawn one QA loop for a task.
    fn dispatch(&mut self, task: Task, reply_tx: tokio::sync::oneshot::Sender<eyre::Result<crate::qa::QaLoopResult>>) {
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let working_dir = task
            .project_path
            .clone()
            .or_else(|| self.config.working_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        let vcs: Arc<dyn Vcs> = self
            .vcs_override
            .clone()
            .unwrap_or_else(|| Arc::new(GitVcs::new(&working_dir)));

        let qa_config = QaLoopConfig {
            max_iterations: self.config.qa.max_iterations,
            stop_on_first_failure: self.config.qa.stop_on_first_failure,
            working_dir,
        };
        let build = BuildRunner::from_config(&self.config.gates.build);
        let lint = LintRunner::from_config(&self.config.gates.lint);
        let test = TestRunner::from_config(&self.config.gates.test);
        let review = ReviewRunner::new(self.llm.clone(), vcs, self.config.review.clone());

        let pool = self.pool.clone();
        let contexts = self.contexts.clone();
        let max_tokens = self.config.context.max_tokens;
        let done_tx = self.tx.clone();
        let task_id = task.id.clone();
        let loop_cancel = cancel_rx.clone();

        let handle = tokio::spawn(async move {
            // a fresh context precedes the loop; its rendered text seeds
            // the generate call
            let agent_probe = format!("qa-{}", task.id);
            let context = contexts
                .prepare_agent_context(
                    &agent_probe,
                    &task,
                    ContextOptions {
                        max_tokens,
                        cancel: Some(cancel_rx.clone()),
                        ..Default::default()
                    },
                )
                .await;

            let mut qa = QaLoop::new(qa_config, build, lint, test, review).with_pool(pool);
            if let Ok(context) = &context {
                qa = qa.with_generate_prompt(context.render());
            }

            let result = qa.run_with_cancel(&task, Some(loop_cancel)).await;
            contexts.on_task_complete(&agent_probe).await;

            let disposition = match &result {
                Ok(r) if r.success => TaskDisposition::Completed,
                Ok(r) if r.escalated => TaskDisposition::Escalated,
                Ok(_) => TaskDisposition::Failed,
                Err(_) => TaskDisposition::Cancelled,
            };
            let _ = done_tx
                .send(CoordRequest::TaskDone {
                    task_id: task.id.clone(),
                    disposition,
                })
                .await;
            let _ = reply_tx.send(result);
        });

        self.active.insert(task_id, ActiveTask { cancel_tx, handle });
    }
}
