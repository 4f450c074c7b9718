//! Fresh, bounded, per-task agent contexts
//!
//! - [`budget`] - two-level token budget allocation
//! - [`builder`] - assembly of individual context components
//! - [`manager`] - context lifecycle, freshness and budget invariants
//! - [`memory`] - code-search and memory backend seams
//! - [`integration`] - agent-facing prepare/evict wrapper

pub mod budget;
pub mod builder;
pub mod integration;
pub mod manager;
pub mod memory;

pub use budget::{Budgeter, DynamicBudget, FixedBudget, TokenBudget};
pub use builder::{ContextBuilder, FileContextEntry, FileRelevance};
pub use integration::{AgentContextIntegration, ContextStatus};
pub use manager::{ContextManager, ContextOptions, ContextStats, ContextValidation, TaskContext};
pub use memory::{CodeHit, CodeMemory, CodeSearchOptions, GrepCodeMemory, MemoryBackend, MemoryHit, MemorySearchOptions};
