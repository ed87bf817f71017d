//! Task model: the envelope that travels to an executor and the
//! single-shot settlement that travels back to the caller.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::TaskId;
use super::errors::PoolError;

/// Outcome delivered through a task's settlement.
pub type TaskResult = Result<serde_json::Value, PoolError>;

/// Payload + optional queue metadata (+ TaskId).
///
/// `metadata` is never read by the scheduler. Only a custom
/// [`BacklogQueue`](crate::ports::BacklogQueue) may look at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    task_id: TaskId,
    payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
}

impl TaskEnvelope {
    pub fn new(
        task_id: TaskId,
        payload: serde_json::Value,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            task_id,
            payload,
            metadata,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }
}

/// Write side of a task's result channel.
///
/// `resolve` and `reject` consume `self`, so a task cannot be settled twice.
#[derive(Debug)]
pub(crate) struct Settlement {
    tx: oneshot::Sender<TaskResult>,
}

impl Settlement {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<TaskResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub(crate) fn settle(self, result: TaskResult) {
        // receiver gone means the caller dropped its handle; nothing to deliver
        if self.tx.send(result).is_err() {
            tracing::trace!("task handle dropped before settlement");
        }
    }

    pub(crate) fn resolve(self, value: serde_json::Value) {
        self.settle(Ok(value));
    }

    pub(crate) fn reject(self, error: PoolError) {
        self.settle(Err(error));
    }
}

/// An admitted task: envelope plus the settlement the scheduler owns.
///
/// Backlog implementations move `Task`s around and may inspect the envelope,
/// but only the scheduler can settle them.
#[derive(Debug)]
pub struct Task {
    envelope: TaskEnvelope,
    settlement: Settlement,
}

impl Task {
    pub(crate) fn new(envelope: TaskEnvelope, settlement: Settlement) -> Self {
        Self {
            envelope,
            settlement,
        }
    }

    pub fn id(&self) -> TaskId {
        self.envelope.task_id()
    }

    pub fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.envelope.metadata()
    }

    pub(crate) fn into_parts(self) -> (TaskEnvelope, Settlement) {
        (self.envelope, self.settlement)
    }

    pub(crate) fn reject(self, error: PoolError) {
        self.settlement.reject(error);
    }
}

/// Builds a detached task for backlog tests; the receiver is returned so
/// tests can observe settlement.
#[cfg(test)]
pub(crate) fn test_task(
    payload: serde_json::Value,
    metadata: Option<serde_json::Value>,
) -> (Task, oneshot::Receiver<TaskResult>) {
    let (settlement, rx) = Settlement::channel();
    let envelope = TaskEnvelope::new(TaskId::generate(), payload, metadata);
    (Task::new(envelope, settlement), rx)
}
