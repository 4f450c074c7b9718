//! Fresh context lifecycle
//!
//! The manager owns every active [`TaskContext`] and enforces two
//! invariants the rest of the system leans on:
//!
//! 1. **Freshness**: a context's conversation history is empty at creation
//!    and never appended to. Staleness is prevented by rebuilding, not by
//!    mutation.
//! 2. **Budget**: a context's token count never exceeds its budget; when
//!    assembly lands over, dynamic components are truncated in ascending
//!    relevance until it fits.
//!
//! A task (and an agent) has at most one active context at any instant;
//! building a new one atomically evicts the old.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use eyre::{Result, eyre};
use repomap::estimate_tokens;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use super::budget::{Budgeter, TokenBudget};
use super::builder::{ContextBuilder, FileContextEntry};
use super::memory::{CodeHit, MemoryHit};
use crate::domain::{Task, generate_id};
use crate::llm::ChatMessage;

/// Options for building one fresh context
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Total token budget
    pub max_tokens: usize,

    /// System prompt for the worker
    pub system_prompt: String,

    /// Agent the context is being prepared for
    pub agent_id: Option<String>,

    /// Cooperative cancellation; when it flips true mid-build, the
    /// in-flight context is discarded and never enters the active map
    pub cancel: Option<watch::Receiver<bool>>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            system_prompt: "You are a coding agent. Complete the task using the provided context.".to_string(),
            agent_id: None,
            cancel: None,
        }
    }
}

/// A per-(agent, task) bounded bundle of textual inputs
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub context_id: String,
    pub task: Task,
    pub agent_id: Option<String>,

    // fixed components
    pub system_prompt: String,
    pub task_description: String,
    pub repo_map: String,
    pub codebase_docs: String,

    // dynamic components
    pub files: Vec<FileContextEntry>,
    pub code_hits: Vec<CodeHit>,
    pub memory_hits: Vec<MemoryHit>,

    pub token_count: usize,
    pub token_budget: usize,
    pub budget: TokenBudget,
    pub generated_at: DateTime<Utc>,
    pub was_truncated: bool,

    /// Always empty; kept as a field so validation can prove it
    conversation_history: Vec<ChatMessage>,
}

impl TaskContext {
    /// The freshness invariant made observable: always empty.
    pub fn conversation_history(&self) -> &[ChatMessage] {
        &self.conversation_history
    }

    /// Minimal context for degraded operation: system prompt and task
    /// description only.
    pub fn fallback(agent_id: &str, task: &Task, system_prompt: &str, max_tokens: usize) -> Self {
        let mut context = Self {
            context_id: generate_id("ctx", &task.name),
            task: task.clone(),
            agent_id: Some(agent_id.to_string()),
            system_prompt: system_prompt.to_string(),
            task_description: format!("Task: {}\n{}", task.name, task.description),
            repo_map: String::new(),
            codebase_docs: String::new(),
            files: vec![],
            code_hits: vec![],
            memory_hits: vec![],
            token_count: 0,
            token_budget: max_tokens,
            budget: Budgeter.allocate(max_tokens),
            generated_at: Utc::now(),
            was_truncated: false,
            conversation_history: Vec::new(),
        };
        context.token_count = context.recount_tokens();
        context
    }

    /// Recompute the token count from the current components.
    pub fn recount_tokens(&self) -> usize {
        let mut total = estimate_tokens(&self.system_prompt)
            + estimate_tokens(&self.task_description)
            + estimate_tokens(&self.repo_map)
            + estimate_tokens(&self.codebase_docs);
        total += self.files.iter().map(|f| f.tokens).sum::<usize>();
        total += self.code_hits.iter().map(|h| estimate_tokens(&h.content)).sum::<usize>();
        total += self.memory_hits.iter().map(|h| estimate_tokens(&h.content)).sum::<usize>();
        total
    }

    /// Render the whole context as one prompt block.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.task_description);
        if !self.repo_map.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.repo_map);
        }
        if !self.codebase_docs.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.codebase_docs);
        }
        for file in &self.files {
            out.push_str(&format!("\n\n--- {} ---\n{}", file.path, file.content));
        }
        if !self.code_hits.is_empty() {
            out.push_str("\n\nRelevant code:\n");
            for hit in &self.code_hits {
                out.push_str(&hit.content);
                out.push('\n');
            }
        }
        if !self.memory_hits.is_empty() {
            out.push_str("\nRelevant notes:\n");
            for hit in &self.memory_hits {
                out.push_str(&hit.content);
                out.push('\n');
            }
        }
        out
    }
}

/// Result of validating a context
#[derive(Debug, Clone)]
pub struct ContextValidation {
    pub valid: bool,
    pub token_count: usize,
    pub max_tokens: usize,

    /// Component name -> token count
    pub breakdown: HashMap<String, usize>,
}

/// Lifetime counters for observability
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextStats {
    pub created: u64,
    pub cleared: u64,
    pub peak_token_usage: usize,
    pub active: usize,
}

#[derive(Default)]
struct ManagerInner {
    by_task: HashMap<String, TaskContext>,

    /// agent id -> task id of its active context
    by_agent: HashMap<String, String>,

    created: u64,
    cleared: u64,
    peak_token_usage: usize,
}

/// Owns context lifecycle for every agent-task pair
pub struct ContextManager {
    builder: ContextBuilder,
    budgeter: Budgeter,
    inner: Mutex<ManagerInner>,
}

impl ContextManager {
    pub fn new(builder: ContextBuilder) -> Self {
        Self {
            builder,
            budgeter: Budgeter,
            inner: Mutex::new(ManagerInner::default()),
        }
    }

    /// Build a fresh context for a task, replacing any prior one.
    pub async fn build_fresh_context(&self, task: &Task, options: ContextOptions) -> Result<TaskContext> {
        debug!(task_id = %task.id, max_tokens = options.max_tokens, "ContextManager::build_fresh_context: called");

        // evict any prior context for the task before building
        {
            let mut inner = self.inner.lock().await;
            if inner.by_task.remove(&task.id).is_some() {
                debug!(task_id = %task.id, "ContextManager::build_fresh_context: evicted prior context");
                inner.cleared += 1;
            }
        }

        let budget = self.budgeter.allocate(options.max_tokens);
        let project_path = task
            .project_path
            .clone()
            .unwrap_or_else(|| self.builder.project_root().to_path_buf());

        let build = async {
            // dynamic components build in parallel, each under its sub-budget
            let (repo_map, codebase_docs, files, code_hits, memory_hits) = tokio::join!(
                self.builder.build_repo_map_context(&project_path, budget.fixed.repo_map),
                self.builder.build_codebase_docs_context(&project_path, task, budget.fixed.codebase_docs),
                self.builder.build_file_context(&task.target_files, task, budget.dynamic.files),
                self.builder.build_code_context(&task.description, budget.dynamic.code_search),
                self.builder.build_memory_context(task, budget.dynamic.memories),
            );
            (repo_map, codebase_docs, files, code_hits, memory_hits)
        };

        let (repo_map, codebase_docs, files, code_hits, memory_hits) = match options.cancel.clone() {
            Some(mut cancel) => {
                tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel) => {
                        info!(task_id = %task.id, "Context build cancelled; discarding partial components");
                        return Err(eyre!("Context build cancelled"));
                    }
                    components = build => components,
                }
            }
            None => build.await,
        };

        let task_description = render_task_description(task);

        let mut context = TaskContext {
            context_id: generate_id("ctx", &task.name),
            task: task.clone(),
            agent_id: options.agent_id.clone(),
            system_prompt: options.system_prompt,
            task_description,
            repo_map,
            codebase_docs,
            files,
            code_hits,
            memory_hits,
            token_count: 0,
            token_budget: options.max_tokens,
            budget,
            generated_at: Utc::now(),
            was_truncated: false,
            conversation_history: Vec::new(),
        };
        context.token_count = context.recount_tokens();

        if context.token_count > context.token_budget {
            self.truncate_to_budget(&mut context);
        }

        // eviction of the old and insertion of the new are one atomic step
        {
            let mut inner = self.inner.lock().await;
            inner.created += 1;
            inner.peak_token_usage = inner.peak_token_usage.max(context.token_count);
            if let Some(agent_id) = &options.agent_id {
                if let Some(prior_task) = inner.by_agent.insert(agent_id.clone(), task.id.clone())
                    && prior_task != task.id
                    && inner.by_task.remove(&prior_task).is_some()
                {
                    debug!(%agent_id, %prior_task, "ContextManager::build_fresh_context: replaced agent's prior context");
                    inner.cleared += 1;
                }
            }
            inner.by_task.insert(task.id.clone(), context.clone());
        }

        info!(
            task_id = %task.id,
            context_id = %context.context_id,
            tokens = context.token_count,
            budget = context.token_budget,
            truncated = context.was_truncated,
            "Fresh context built"
        );
        Ok(context)
    }

    /// Drop dynamic components in ascending relevance until the context
    /// fits its budget.
    fn truncate_to_budget(&self, context: &mut TaskContext) {
        debug!(
            context_id = %context.context_id,
            tokens = context.token_count,
            budget = context.token_budget,
            "ContextManager::truncate_to_budget: called"
        );
        context.was_truncated = true;

        // memories first, then code hits, then files lowest-score-first
        while context.token_count > context.token_budget && context.memory_hits.pop().is_some() {
            context.token_count = context.recount_tokens();
        }
        while context.token_count > context.token_budget && context.code_hits.pop().is_some() {
            context.token_count = context.recount_tokens();
        }
        while context.token_count > context.token_budget && !context.files.is_empty() {
            // files are sorted descending by score, so the tail is least
            // relevant
            context.files.pop();
            context.token_count = context.recount_tokens();
        }
    }

    /// Pure recompute of a context's validity.
    pub fn validate_context(&self, context: &TaskContext) -> ContextValidation {
        let mut breakdown = HashMap::new();
        breakdown.insert("system_prompt".to_string(), estimate_tokens(&context.system_prompt));
        breakdown.insert("task_description".to_string(), estimate_tokens(&context.task_description));
        breakdown.insert("repo_map".to_string(), estimate_tokens(&context.repo_map));
        breakdown.insert("codebase_docs".to_string(), estimate_tokens(&context.codebase_docs));
        breakdown.insert("files".to_string(), context.files.iter().map(|f| f.tokens).sum());
        breakdown.insert(
            "code_search".to_string(),
            context.code_hits.iter().map(|h| estimate_tokens(&h.content)).sum(),
        );
        breakdown.insert(
            "memories".to_string(),
            context.memory_hits.iter().map(|h| estimate_tokens(&h.content)).sum(),
        );

        let token_count = context.recount_tokens();
        ContextValidation {
            valid: token_count <= context.token_budget && context.conversation_history().is_empty(),
            token_count,
            max_tokens: context.token_budget,
            breakdown,
        }
    }

    /// Evict the active context for a task.
    pub async fn clear_task_context(&self, task_id: &str) {
        let mut inner = self.inner.lock().await;
        if inner.by_task.remove(task_id).is_some() {
            inner.cleared += 1;
            inner.by_agent.retain(|_, t| t != task_id);
            debug!(%task_id, "ContextManager::clear_task_context: cleared");
        }
    }

    /// Evict the active context for an agent.
    pub async fn clear_agent_context(&self, agent_id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(task_id) = inner.by_agent.remove(agent_id) {
            if inner.by_task.remove(&task_id).is_some() {
                inner.cleared += 1;
            }
            debug!(%agent_id, %task_id, "ContextManager::clear_agent_context: cleared");
        }
    }

    /// Look up the active context for a task.
    pub async fn get_task_context(&self, task_id: &str) -> Option<TaskContext> {
        self.inner.lock().await.by_task.get(task_id).cloned()
    }

    pub async fn get_stats(&self) -> ContextStats {
        let inner = self.inner.lock().await;
        ContextStats {
            created: inner.created,
            cleared: inner.cleared,
            peak_token_usage: inner.peak_token_usage,
            active: inner.by_task.len(),
        }
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow() {
        if cancel.changed().await.is_err() {
            // sender dropped without cancelling; never resolve
            std::future::pending::<()>().await;
        }
    }
}

fn render_task_description(task: &Task) -> String {
    let mut text = format!("Task: {}\n{}", task.name, task.description);
    if !task.target_files.is_empty() {
        text.push_str("\nTarget files:\n");
        for file in &task.target_files {
            text.push_str(&format!("- {}\n", file));
        }
    }
    if let Some(criteria) = &task.acceptance_criteria {
        text.push_str(&format!("\nAcceptance criteria: {}", criteria));
    }
    text
}
