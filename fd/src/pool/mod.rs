//! Agent pool and work dispatch
//!
//! The pool owns a bounded set of worker agents, hands them out one task at
//! a time, and releases them exactly once per task regardless of outcome.
//! A worker `Err` is an agent crash: the agent goes to `dead`, is removed,
//! and the pool re-spawns on the next request.

mod agent;
pub mod worker;

pub use agent::{Agent, AgentKind, AgentState};
pub use worker::{LlmCoderWorker, TaskWorker};

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::domain::{RunTaskContext, Task, TaskOutcome};

/// Pool resource errors
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    #[error("Agent pool exhausted ({max} agents alive)")]
    Exhausted { max: usize },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
}

/// Counters for observability
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub alive: usize,
    pub idle: usize,
    pub busy: usize,
    pub spawned_total: u64,
    pub crashed_total: u64,
    pub tasks_run: u64,
}

#[derive(Default)]
struct PoolInner {
    agents: HashMap<String, Agent>,
    spawned_total: u64,
    crashed_total: u64,
    tasks_run: u64,
}

/// Bounded pool of worker agents
pub struct AgentPool {
    config: PoolConfig,
    worker: Arc<dyn TaskWorker>,
    inner: Mutex<PoolInner>,
}

impl AgentPool {
    pub fn new(config: PoolConfig, worker: Arc<dyn TaskWorker>) -> Self {
        Self {
            config,
            worker,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// Claim an idle agent of the given kind, or `None` without blocking.
    ///
    /// Claiming and the transition to busy are one atomic step under the
    /// pool lock.
    pub async fn get_available_by_type(&self, kind: AgentKind) -> Option<Agent> {
        let mut inner = self.inner.lock().await;
        let agent = inner
            .agents
            .values_mut()
            .find(|a| a.kind == kind && a.is_available())?;
        agent.state = AgentState::Busy;
        debug!(agent_id = %agent.id, %kind, "AgentPool::get_available_by_type: claimed");
        Some(agent.clone())
    }

    /// Spawn and register a new agent; errors when the pool is full.
    ///
    /// The new agent starts `idle`; callers race for it like any other.
    pub async fn spawn(&self, kind: AgentKind) -> Result<Agent, PoolError> {
        let mut inner = self.inner.lock().await;
        if inner.agents.len() >= self.config.max_agents {
            warn!(max = self.config.max_agents, "AgentPool::spawn: exhausted");
            return Err(PoolError::Exhausted {
                max: self.config.max_agents,
            });
        }
        let agent = Agent::new(kind);
        inner.agents.insert(agent.id.clone(), agent.clone());
        inner.spawned_total += 1;
        info!(agent_id = %agent.id, %kind, alive = inner.agents.len(), "Agent spawned");
        Ok(agent)
    }

    /// Claim an idle agent or spawn a new one.
    pub async fn acquire(&self, kind: AgentKind) -> Result<Agent, PoolError> {
        if let Some(agent) = self.get_available_by_type(kind).await {
            return Ok(agent);
        }
        let agent = self.spawn(kind).await?;
        // claim the fresh agent before anyone else sees it idle
        let mut inner = self.inner.lock().await;
        match inner.agents.get_mut(&agent.id) {
            Some(a) => {
                a.state = AgentState::Busy;
                Ok(a.clone())
            }
            None => Err(PoolError::UnknownAgent(agent.id)),
        }
    }

    /// Run one task on an agent and return its structured outcome.
    ///
    /// The agent is released exactly once whatever happens: back to idle on
    /// a normal outcome, to dead (and out of the table) when the worker
    /// errors.
    pub async fn run_task(&self, agent: &Agent, task: &Task, ctx: &RunTaskContext) -> eyre::Result<TaskOutcome> {
        debug!(agent_id = %agent.id, task_id = %task.id, "AgentPool::run_task: called");
        {
            let mut inner = self.inner.lock().await;
            let tracked = inner
                .agents
                .get_mut(&agent.id)
                .ok_or_else(|| PoolError::UnknownAgent(agent.id.clone()))?;
            tracked.state = AgentState::Busy;
            inner.tasks_run += 1;
        }

        let result = self.worker.run(agent, task, ctx).await;

        match result {
            Ok(outcome) => {
                let mut inner = self.inner.lock().await;
                if let Some(tracked) = inner.agents.get_mut(&agent.id) {
                    tracked.state = AgentState::Idle;
                    tracked.tasks_completed += 1;
                }
                debug!(agent_id = %agent.id, success = outcome.success, "AgentPool::run_task: released");
                Ok(outcome)
            }
            Err(e) => {
                let mut inner = self.inner.lock().await;
                inner.agents.remove(&agent.id);
                inner.crashed_total += 1;
                warn!(agent_id = %agent.id, task_id = %task.id, error = %e, "Agent crashed; removed from pool");
                Err(e)
            }
        }
    }

    /// Return an agent to idle; a second release is silently absorbed.
    pub async fn release(&self, agent_id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(agent) = inner.agents.get_mut(agent_id)
            && agent.state == AgentState::Busy
        {
            agent.state = AgentState::Idle;
            debug!(%agent_id, "AgentPool::release: released");
        }
    }

    /// Mark every agent draining, then drop them.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        for agent in inner.agents.values_mut() {
            agent.state = AgentState::Draining;
        }
        let count = inner.agents.len();
        inner.agents.clear();
        info!(agents = count, "Agent pool shut down");
    }

    pub async fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().await;
        PoolStats {
            alive: inner.agents.len(),
            idle: inner.agents.values().filter(|a| a.state == AgentState::Idle).count(),
            busy: inner.agents.values().filter(|a| a.state == AgentState::Busy).count(),
            spawned_total: inner.spawned_total,
            crashed_total: inner.crashed_total,
            tasks_run: inner.tasks_run,
        }
    }
}
