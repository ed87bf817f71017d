//! Executor port - the backend that actually runs a task.
//!
//! The pool creates one executor per worker through an [`ExecutorFactory`]
//! and never cares whether that is a thread, a process, or a remote sandbox.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ExecutorError, TaskEnvelope, WorkerId};

/// One execution unit. A worker with `concurrency_per_worker > 1` calls
/// `run` concurrently on the same executor.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one task to completion.
    async fn run(&self, envelope: TaskEnvelope) -> Result<serde_json::Value, ExecutorError>;

    /// Stop immediately. In-flight `run` futures are aborted by the worker;
    /// later calls to `run` should fail with [`ExecutorError::Terminated`].
    async fn terminate(&self);
}

/// Creates executors when the pool scales up.
///
/// `create` may take a while (spawning a process, loading code). The pool
/// counts the worker from the moment `create` is called and queues work on
/// it until the executor is returned.
#[async_trait]
pub trait ExecutorFactory: Send + Sync {
    async fn create(&self, worker_id: WorkerId) -> Result<Arc<dyn Executor>, ExecutorError>;
}
