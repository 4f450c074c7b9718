//! Forgedaemon - autonomous multi-agent code-generation orchestrator
//!
//! A user supplies a natural-language task; the system plans work, spawns
//! worker agents that drive code generation, and runs each agent's output
//! through a quality-assurance pipeline (build -> lint -> test -> review),
//! retrying with accumulated error context and escalating when the retry
//! budget runs out. A sibling crate, `repomap`, analyzes the user's
//! codebase into a symbol/dependency graph and serves fresh, bounded,
//! per-task context windows to each agent.
//!
//! # Core Concepts
//!
//! - **Fresh Context Always**: every task gets a newly built context; no
//!   conversation carries over between tasks
//! - **Gates Decide**: completion is determined by typechecker, linter,
//!   test-runner exit codes and an AI review, not by agent claims
//! - **Escalation Is Terminal, Not Exceptional**: an exhausted retry
//!   budget produces a structured result with the last-seen gate output
//!
//! # Modules
//!
//! - [`coordinator`] - top-level dispatch actor and handle
//! - [`qa`] - the gate-sequencing retry loop
//! - [`pool`] - agent lifecycle and work routing
//! - [`gates`] - the four gate runners and their result types
//! - [`context`] - fresh context building and budgeting
//! - [`llm`] - LLM client trait and Anthropic implementation
//! - [`vcs`] - version-control diff interface
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod domain;
pub mod gates;
pub mod llm;
pub mod pool;
pub mod qa;
pub mod vcs;

// Re-export commonly used types
pub use config::{Config, LlmConfig, QaConfig};
pub use context::{
    AgentContextIntegration, Budgeter, ContextBuilder, ContextManager, ContextOptions, TaskContext, TokenBudget,
};
pub use coordinator::{CoordRequest, Coordinator, CoordinatorHandle, CoordinatorMetrics};
pub use domain::{RunTaskContext, Task, TaskOutcome};
pub use gates::{
    BuildResult, BuildRunner, ErrorEntry, Gate, GateResult, LintResult, LintRunner, ReviewResult, ReviewRunner,
    Severity, TestResult, TestRunner,
};
pub use llm::{AnthropicClient, ChatMessage, ChatResponse, LlmClient, LlmError};
pub use pool::{Agent, AgentKind, AgentPool, AgentState, LlmCoderWorker, TaskWorker};
pub use qa::{QaLoop, QaLoopConfig, QaLoopResult};
pub use vcs::{GitVcs, Vcs};
