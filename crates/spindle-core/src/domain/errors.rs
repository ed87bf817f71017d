//! Errors surfaced by the pool and by the executor port.

use thiserror::Error;

/// Error delivered to a caller, either from `submit` (admission) or through
/// the task's settlement (execution / teardown).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Backlog is full. Retry later.
    #[error("backlog is at its limit ({max_backlog} tasks)")]
    QueueAtLimit { max_backlog: usize },

    /// Queueing is disabled and every worker slot is taken.
    #[error("no worker available and queueing is disabled")]
    NoQueueAvailable,

    /// The task was running or queued when its worker (or the pool) was terminated.
    #[error("worker terminated")]
    WorkerTerminated,

    /// The executor reported an application error; passed through verbatim.
    #[error("{0}")]
    ExecutorFailure(String),

    /// The worker the task was assigned to could not be started.
    #[error("worker failed to start: {0}")]
    WorkerSpawnFailed(String),

    /// Removed from the backlog by `Pool::cancel`.
    #[error("task cancelled before dispatch")]
    Cancelled,

    /// The pool has been destroyed.
    #[error("pool is destroyed")]
    Destroyed,

    /// Typed payload could not be encoded or decoded.
    #[error("payload codec: {0}")]
    Payload(String),
}

impl PoolError {
    /// Admission was refused because of load; nothing happened, so the same
    /// submission may be retried.
    pub fn is_backpressure(&self) -> bool {
        matches!(
            self,
            PoolError::QueueAtLimit { .. } | PoolError::NoQueueAvailable
        )
    }
}

/// Error reported by an [`Executor`](crate::ports::Executor) or its factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("{0}")]
    Failed(String),

    #[error("executor terminated")]
    Terminated,

    #[error("executor could not be created: {0}")]
    Spawn(String),
}

impl From<ExecutorError> for PoolError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Failed(msg) => PoolError::ExecutorFailure(msg),
            ExecutorError::Terminated => PoolError::WorkerTerminated,
            ExecutorError::Spawn(msg) => PoolError::WorkerSpawnFailed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PoolError::QueueAtLimit { max_backlog: 4 }, true)]
    #[case(PoolError::NoQueueAvailable, true)]
    #[case(PoolError::WorkerTerminated, false)]
    #[case(PoolError::ExecutorFailure("boom".into()), false)]
    #[case(PoolError::Destroyed, false)]
    fn backpressure_classification(#[case] err: PoolError, #[case] expected: bool) {
        assert_eq!(err.is_backpressure(), expected);
    }

    #[test]
    fn executor_failure_message_is_verbatim() {
        let err: PoolError = ExecutorError::Failed("disk on fire".into()).into();
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn executor_termination_maps_to_worker_terminated() {
        let err: PoolError = ExecutorError::Terminated.into();
        assert_eq!(err, PoolError::WorkerTerminated);
    }
}
