//! CoordinatorHandle - client interface for work dispatch

use eyre::{Result, eyre};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::messages::{CoordRequest, CoordinatorMetrics};
use crate::domain::Task;
use crate::qa::QaLoopResult;

/// Cloneable handle for talking to a running [`Coordinator`](super::Coordinator)
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordRequest>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>) -> Self {
        Self { tx }
    }

    /// Submit a task and await its terminal QA loop result.
    pub async fn submit(&self, task: Task) -> Result<QaLoopResult> {
        debug!(task_id = %task.id, "CoordinatorHandle::submit: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordRequest::Submit { task, reply_tx })
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))?;

        reply_rx.await.map_err(|_| eyre!("Coordinator dropped the task"))?
    }

    /// Request cancellation of a running task.
    pub async fn cancel(&self, task_id: &str) -> Result<()> {
        debug!(%task_id, "CoordinatorHandle::cancel: called");
        self.tx
            .send(CoordRequest::Cancel {
                task_id: task_id.to_string(),
            })
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))
    }

    /// Snapshot the coordinator's metrics.
    pub async fn metrics(&self) -> Result<CoordinatorMetrics> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordRequest::Metrics { reply_tx })
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))?;
        reply_rx.await.map_err(|_| eyre!("Coordinator shut down"))
    }

    /// Ask the coordinator to drain and stop.
    pub async fn shutdown(&self) -> Result<()> {
        debug!("CoordinatorHandle::shutdown: called");
        self.tx
            .send(CoordRequest::Shutdown)
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))
    }
}
