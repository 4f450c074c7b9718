//! Agent-side context integration
//!
//! A thin wrapper mapping agents to their active contexts: prepare builds a
//! fresh context for the agent's next task, completion and failure both
//! evict. With `throw_on_error` disabled, a failed build degrades to a
//! minimal fallback context and the failure is recorded for observability.

use std::collections::HashMap;
use std::sync::Arc;

use eyre::Result;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::manager::{ContextManager, ContextOptions, TaskContext};
use crate::domain::Task;

/// Last-known context status per agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStatus {
    Ready,
    Error,
    Cleared,
}

/// Maps agents to fresh contexts and evicts on task completion
pub struct AgentContextIntegration {
    manager: Arc<ContextManager>,

    /// Build failures become fallback contexts when false
    throw_on_error: bool,

    /// agent id -> (context id, status)
    tracked: Mutex<HashMap<String, (String, ContextStatus)>>,
}

impl AgentContextIntegration {
    pub fn new(manager: Arc<ContextManager>, throw_on_error: bool) -> Self {
        Self {
            manager,
            throw_on_error,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    /// Build a fresh context for an agent's next task.
    pub async fn prepare_agent_context(
        &self,
        agent_id: &str,
        task: &Task,
        mut options: ContextOptions,
    ) -> Result<TaskContext> {
        debug!(%agent_id, task_id = %task.id, "AgentContextIntegration::prepare_agent_context: called");
        options.agent_id = Some(agent_id.to_string());

        match self.manager.build_fresh_context(task, options.clone()).await {
            Ok(context) => {
                self.tracked
                    .lock()
                    .await
                    .insert(agent_id.to_string(), (context.context_id.clone(), ContextStatus::Ready));
                Ok(context)
            }
            Err(e) if self.throw_on_error => Err(e),
            Err(e) => {
                warn!(%agent_id, task_id = %task.id, error = %e, "Context build failed; using fallback");
                let fallback = TaskContext::fallback(agent_id, task, &options.system_prompt, options.max_tokens);
                self.tracked
                    .lock()
                    .await
                    .insert(agent_id.to_string(), (fallback.context_id.clone(), ContextStatus::Error));
                Ok(fallback)
            }
        }
    }

    /// Evict the agent's context after a successful task.
    pub async fn on_task_complete(&self, agent_id: &str) {
        debug!(%agent_id, "AgentContextIntegration::on_task_complete: called");
        self.evict(agent_id).await;
    }

    /// Evict the agent's context after a failed task.
    pub async fn on_task_failed(&self, agent_id: &str) {
        debug!(%agent_id, "AgentContextIntegration::on_task_failed: called");
        self.evict(agent_id).await;
    }

    /// Last recorded status for an agent, if any.
    pub async fn status(&self, agent_id: &str) -> Option<ContextStatus> {
        self.tracked.lock().await.get(agent_id).map(|(_, status)| *status)
    }

    async fn evict(&self, agent_id: &str) {
        self.manager.clear_agent_context(agent_id).await;
        if let Some(entry) = self.tracked.lock().await.get_mut(agent_id) {
            entry.1 = ContextStatus::Cleared;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, ContextConfig};
    use crate::context::builder::ContextBuilder;
    use tempfile::tempdir;
    use tokio::sync::watch;

    fn integration(root: &std::path::Path, throw_on_error: bool) -> AgentContextIntegration {
        let builder = ContextBuilder::new(root, ContextConfig::default(), AnalysisConfig::default());
        AgentContextIntegration::new(Arc::new(ContextManager::new(builder)), throw_on_error)
    }

    #[tokio::test]
    async fn test_prepare_tracks_ready_status() {
        let temp = tempdir().unwrap();
        let integration = integration(temp.path(), true);
        let task = Task::new("t", "d");

        let context = integration
            .prepare_agent_context("agent-1", &task, ContextOptions::default())
            .await
            .unwrap();

        assert_eq!(context.agent_id.as_deref(), Some("agent-1"));
        assert_eq!(integration.status("agent-1").await, Some(ContextStatus::Ready));
    }

    #[tokio::test]
    async fn test_complete_evicts_and_marks_cleared() {
        let temp = tempdir().unwrap();
        let integration = integration(temp.path(), true);
        let task = Task::new("t", "d");

        integration
            .prepare_agent_context("agent-1", &task, ContextOptions::default())
            .await
            .unwrap();
        integration.on_task_complete("agent-1").await;

        assert_eq!(integration.status("agent-1").await, Some(ContextStatus::Cleared));
    }

    #[tokio::test]
    async fn test_fallback_on_build_failure() {
        let temp = tempdir().unwrap();
        let integration = integration(temp.path(), false);
        let task = Task::new("t", "d");

        // cancelled builds fail; with throw_on_error=false that degrades to
        // a fallback context
        let (_tx, rx) = watch::channel(true);
        let context = integration
            .prepare_agent_context(
                "agent-1",
                &task,
                ContextOptions {
                    cancel: Some(rx),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(context.repo_map.is_empty());
        assert!(context.files.is_empty());
        assert!(context.task_description.contains(&task.name));
        assert_eq!(integration.status("agent-1").await, Some(ContextStatus::Error));
    }

    #[tokio::test]
    async fn test_throw_on_error_propagates() {
        let temp = tempdir().unwrap();
        let integration = integration(temp.path(), true);
        let task = Task::new("t", "d");

        let (_tx, rx) = watch::channel(true);
        let result = integration
            .prepare_agent_context(
                "agent-1",
                &task,
                ContextOptions {
                    cancel: Some(rx),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());
    }
}
