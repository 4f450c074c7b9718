//! Worker agent types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::generate_id;

/// What a worker agent is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Coder,
    Reviewer,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Coder => write!(f, "coder"),
            AgentKind::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// Lifecycle state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Available for assignment
    Idle,
    /// Assigned to exactly one task
    Busy,
    /// Finishing current work; no new assignments
    Draining,
    /// Crashed or shut down; removed from rotation
    Dead,
}

/// A pooled worker agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub kind: AgentKind,
    pub state: AgentState,

    #[serde(rename = "spawned-at")]
    pub spawned_at: DateTime<Utc>,

    #[serde(rename = "tasks-completed")]
    pub tasks_completed: u64,
}

impl Agent {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            id: generate_id("agent", &kind.to_string()),
            kind,
            state: AgentState::Idle,
            spawned_at: Utc::now(),
            tasks_completed: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == AgentState::Idle
    }
}
