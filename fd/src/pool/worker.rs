//! Task workers
//!
//! A [`TaskWorker`] is the thing an agent actually does: given a task and a
//! run context, produce an outcome. The pool treats a worker `Err` as an
//! agent crash; expected failures (a refusal, a bad LLM reply) are
//! successful invocations with `success = false`.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use tracing::{debug, warn};

use super::agent::Agent;
use crate::domain::{RunTaskContext, Task, TaskOutcome};
use crate::llm::{ChatMessage, LlmClient};

/// Executes one task invocation on behalf of an agent
#[async_trait]
pub trait TaskWorker: Send + Sync {
    async fn run(&self, agent: &Agent, task: &Task, ctx: &RunTaskContext) -> Result<TaskOutcome>;
}

const DEFAULT_PROMPT_TEMPLATE: &str = "Task: {{task-name}}\n\
{{task-description}}\n\n\
Working directory: {{working-directory}}\n\
Relevant files:\n{{relevant-files}}\n\
{{previous-attempts}}";

const CODER_SYSTEM_PROMPT: &str = "You are a coding agent. Produce the code changes the task asks for. \
Be concrete: emit complete file contents or unified diffs, never prose-only answers.";

/// LLM-backed coder worker
///
/// Renders a prompt from the task and run context with plain placeholder
/// replacement and sends a single chat turn.
pub struct LlmCoderWorker {
    llm: Arc<dyn LlmClient>,
    prompt_template: String,
}

impl LlmCoderWorker {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    fn render_prompt(&self, task: &Task, ctx: &RunTaskContext) -> String {
        let relevant_files = if ctx.relevant_files.is_empty() {
            "(none listed)".to_string()
        } else {
            ctx.relevant_files.iter().map(|f| format!("- {}", f)).collect::<Vec<_>>().join("\n")
        };
        let previous_attempts = if ctx.previous_attempts.is_empty() {
            String::new()
        } else {
            format!("Previous attempts failed with:\n{}\n", ctx.previous_attempts.join("\n---\n"))
        };

        self.prompt_template
            .replace("{{task-name}}", &task.name)
            .replace("{{task-description}}", &task.description)
            .replace("{{working-directory}}", &ctx.working_dir.display().to_string())
            .replace("{{relevant-files}}", &relevant_files)
            .replace("{{previous-attempts}}", &previous_attempts)
    }
}

#[async_trait]
impl TaskWorker for LlmCoderWorker {
    async fn run(&self, agent: &Agent, task: &Task, ctx: &RunTaskContext) -> Result<TaskOutcome> {
        debug!(agent_id = %agent.id, task_id = %task.id, "LlmCoderWorker::run: called");
        let prompt = self.render_prompt(task, ctx);

        let messages = vec![ChatMessage::system(CODER_SYSTEM_PROMPT), ChatMessage::user(prompt)];
        match self.llm.chat(&messages).await {
            Ok(response) => {
                debug!(agent_id = %agent.id, chars = response.content.len(), "LlmCoderWorker::run: got response");
                Ok(TaskOutcome::ok_with_artifact(response.content))
            }
            Err(e) => {
                warn!(agent_id = %agent.id, task_id = %task.id, error = %e, "Coder LLM call failed");
                Ok(TaskOutcome::failed(format!("LLM call failed: {}", e)))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::pool::agent::AgentKind;

    #[tokio::test]
    async fn test_prompt_rendering() {
        let llm = Arc::new(MockLlmClient::new(vec!["diff".to_string()]));
        let worker = LlmCoderWorker::new(llm.clone());

        let task = Task::new("fix bug", "make it work");
        let ctx = RunTaskContext {
            working_dir: "/tmp/project".into(),
            relevant_files: vec!["src/a.ts".to_string()],
            previous_attempts: vec!["[build] src/a.ts:1:1 TS1 broken".to_string()],
        };
        let agent = Agent::new(AgentKind::Coder);

        let outcome = worker.run(&agent, &task, &ctx).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.artifact.as_deref(), Some("diff"));

        let prompt = llm.request(0).unwrap()[1].content.clone();
        assert!(prompt.contains("fix bug"));
        assert!(prompt.contains("make it work"));
        assert!(prompt.contains("/tmp/project"));
        assert!(prompt.contains("- src/a.ts"));
        assert!(prompt.contains("Previous attempts failed with:"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_outcome_not_crash() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let worker = LlmCoderWorker::new(llm);
        let task = Task::new("t", "d");
        let agent = Agent::new(AgentKind::Coder);

        let outcome = worker.run(&agent, &task, &RunTaskContext::default()).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("LLM call failed"));
    }

    #[tokio::test]
    async fn test_empty_context_placeholders() {
        let llm = Arc::new(MockLlmClient::new(vec!["ok".to_string()]));
        let worker = LlmCoderWorker::new(llm.clone());
        let task = Task::new("t", "d");
        let agent = Agent::new(AgentKind::Coder);

        worker.run(&agent, &task, &RunTaskContext::default()).await.unwrap();
        let prompt = llm.request(0).unwrap()[1].content.clone();
        assert!(prompt.contains("(none listed)"));
        assert!(!prompt.contains("{{"));
    }
}
