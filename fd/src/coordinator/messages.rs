//! Message types for the Coordinator

use tokio::sync::oneshot;

use crate::domain::Task;
use crate::qa::QaLoopResult;

/// Requests to the Coordinator task
#[derive(Debug)]
pub enum CoordRequest {
    /// Dispatch a task; the reply resolves when its QA loop terminates
    Submit {
        task: Task,
        reply_tx: oneshot::Sender<eyre::Result<QaLoopResult>>,
    },

    /// Cancel a running task; its loop starts no further gates
    Cancel { task_id: String },

    /// Snapshot the metrics counters
    Metrics {
        reply_tx: oneshot::Sender<CoordinatorMetrics>,
    },

    /// Internal: a task's loop terminated
    TaskDone { task_id: String, disposition: TaskDisposition },

    /// Stop accepting work, cancel active loops, and exit
    Shutdown,
}

/// How a dispatched task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskDisposition {
    Completed,
    Escalated,
    Cancelled,
    Failed,
}

/// Counters exposed by the Coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorMetrics {
    pub submitted: u64,
    pub completed: u64,
    pub escalated: u64,
    pub cancelled: u64,
    pub failed: u64,
    pub active: usize,
}
