//! Token budget allocation
//!
//! One fresh context gets a two-level budget: a fixed layer for the
//! components that exist for every task, and a dynamic layer for
//! content that scales with the task. Every estimate goes through
//! [`repomap::estimate_tokens`] so fractions compose with the formatter.

use repomap::estimate_tokens;

/// Budget for the always-present components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBudget {
    pub system_prompt: usize,
    pub repo_map: usize,
    pub codebase_docs: usize,
    pub task_description: usize,
}

impl FixedBudget {
    pub fn total(&self) -> usize {
        self.system_prompt + self.repo_map + self.codebase_docs + self.task_description
    }
}

/// Budget for the per-task dynamic components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicBudget {
    pub files: usize,
    pub code_search: usize,
    pub memories: usize,

    /// Held back for the user's own query text
    pub user_reserve: usize,
}

impl DynamicBudget {
    pub fn total(&self) -> usize {
        self.files + self.code_search + self.memories + self.user_reserve
    }
}

/// Full two-level budget for one context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub total: usize,
    pub fixed: FixedBudget,
    pub dynamic: DynamicBudget,
}

impl TokenBudget {
    pub fn allocated(&self) -> usize {
        self.fixed.total() + self.dynamic.total()
    }
}

/// Splits a total token budget across context components.
///
/// Fractions are fixed percentages; integer division guarantees the sum of
/// both layers never exceeds the total.
#[derive(Debug, Clone, Copy, Default)]
pub struct Budgeter;

impl Budgeter {
    pub fn allocate(&self, max_tokens: usize) -> TokenBudget {
        TokenBudget {
            total: max_tokens,
            fixed: FixedBudget {
                system_prompt: max_tokens / 10,
                repo_map: max_tokens / 5,
                codebase_docs: max_tokens / 10,
                task_description: max_tokens / 20,
            },
            dynamic: DynamicBudget {
                files: max_tokens * 3 / 10,
                code_search: max_tokens / 10,
                memories: max_tokens / 20,
                user_reserve: max_tokens / 10,
            },
        }
    }
}

/// Keep the longest prefix of `items` whose rendered texts fit `budget`.
///
/// The shared prefix-fit policy for search and memory components.
pub fn prefix_fit<T>(items: Vec<T>, budget: usize, render: impl Fn(&T) -> &str) -> Vec<T> {
    let mut used = 0;
    let mut kept = Vec::new();
    for item in items {
        let cost = estimate_tokens(render(&item));
        if used + cost > budget {
            break;
        }
        used += cost;
        kept.push(item);
    }
    kept
}
