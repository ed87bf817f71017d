//! TaskHandle - the caller's side of an admitted task.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::domain::{PoolError, TaskId, TaskResult};

/// Read side of an admitted task's settlement. Await it for the result.
///
/// Dropping the handle does not cancel the task; use `Pool::cancel` for
/// tasks that are still queued.
#[derive(Debug)]
#[must_use = "a TaskHandle does nothing unless awaited"]
pub struct TaskHandle {
    task_id: TaskId,
    rx: oneshot::Receiver<TaskResult>,
}

impl TaskHandle {
    pub(crate) fn new(task_id: TaskId, rx: oneshot::Receiver<TaskResult>) -> Self {
        Self { task_id, rx }
    }

    pub fn id(&self) -> TaskId {
        self.task_id
    }
}

impl Future for TaskHandle {
    type Output = TaskResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // a dropped sender means the pool itself went away without destroy()
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(PoolError::Destroyed)))
    }
}
