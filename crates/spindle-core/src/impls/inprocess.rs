//! In-process executor: runs a shared handler on the tokio runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::domain::{ExecutorError, TaskEnvelope, WorkerId};
use crate::ports::{Executor, ExecutorFactory};

/// The work itself.
///
/// Takes the whole `TaskEnvelope` so the handler can decode the payload as it
/// likes (JSON into a struct, raw value, ...).
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<serde_json::Value, ExecutorError>;
}

/// Executor backed by a [`TaskHandler`] running as plain tokio tasks.
pub struct InProcessExecutor {
    worker_id: WorkerId,
    handler: Arc<dyn TaskHandler>,
    terminated: AtomicBool,
}

impl InProcessExecutor {
    pub fn new(worker_id: WorkerId, handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            worker_id,
            handler,
            terminated: AtomicBool::new(false),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Executor for InProcessExecutor {
    async fn run(&self, envelope: TaskEnvelope) -> Result<serde_json::Value, ExecutorError> {
        if self.is_terminated() {
            return Err(ExecutorError::Terminated);
        }
        self.handler.handle(&envelope).await
    }

    async fn terminate(&self) {
        if !self.terminated.swap(true, Ordering::AcqRel) {
            tracing::debug!(worker_id = %self.worker_id, "in-process executor terminated");
        }
    }
}

/// Hands every new worker an [`InProcessExecutor`] sharing one handler.
pub struct InProcessExecutorFactory {
    handler: Arc<dyn TaskHandler>,
}

impl InProcessExecutorFactory {
    pub fn new(handler: Arc<dyn TaskHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl ExecutorFactory for InProcessExecutorFactory {
    async fn create(&self, worker_id: WorkerId) -> Result<Arc<dyn Executor>, ExecutorError> {
        Ok(Arc::new(InProcessExecutor::new(
            worker_id,
            Arc::clone(&self.handler),
        )))
    }
}
