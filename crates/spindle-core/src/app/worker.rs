//! Worker - one executor slot with bounded concurrent capacity.
//!
//! A worker only does bookkeeping for its own tasks and reports outcomes
//! through [`WorkerEvents`]. It never settles a task: finished and
//! terminated tasks hand their settlement back to the scheduler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};

use crate::domain::task::Settlement;
use crate::domain::{ExecutorError, Task, TaskId, WorkerId, WorkerState};
use crate::ports::{Executor, ExecutorFactory};

pub(crate) type ExecOutcome = Result<serde_json::Value, ExecutorError>;

/// A task finished on a worker (successfully, with an error, or aborted).
#[derive(Debug)]
pub(crate) struct Completion {
    pub(crate) worker_id: WorkerId,
    pub(crate) task_id: TaskId,
    pub(crate) outcome: ExecOutcome,
}

/// Callbacks from worker-owned background tasks into the scheduler.
#[async_trait]
pub(crate) trait WorkerEvents: Send + Sync {
    async fn task_finished(self: Arc<Self>, done: Completion);

    async fn worker_started(
        self: Arc<Self>,
        worker_id: WorkerId,
        started: Result<Arc<dyn Executor>, ExecutorError>,
    );
}

enum Phase {
    /// Executor is being created. Assigned tasks wait here (and count as in flight).
    Starting { pending: Vec<Task> },
    Ready { executor: Arc<dyn Executor> },
}

struct RunningTask {
    settlement: Settlement,
    abort: AbortHandle,
}

/// What is left of a worker after `terminate`.
pub(crate) struct Terminated {
    pub(crate) executor: Option<Arc<dyn Executor>>,
    pub(crate) orphans: Vec<Settlement>,
}

pub(crate) struct Worker {
    id: WorkerId,
    capacity: usize,
    phase: Phase,
    running: HashMap<TaskId, RunningTask>,
    idle_since: Option<Instant>,
}

impl Worker {
    /// Register a new worker and start creating its executor in the background.
    /// The result comes back through `events.worker_started`.
    pub(crate) fn spawn(
        capacity: usize,
        factory: Arc<dyn ExecutorFactory>,
        events: &Arc<dyn WorkerEvents>,
    ) -> Self {
        let id = WorkerId::generate();
        let events = Arc::clone(events);
        tokio::spawn(async move {
            let started = factory.create(id).await;
            events.worker_started(id, started).await;
        });
        Self {
            id,
            capacity,
            phase: Phase::Starting {
                pending: Vec::new(),
            },
            running: HashMap::new(),
            idle_since: None,
        }
    }

    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn in_flight(&self) -> usize {
        let pending = match &self.phase {
            Phase::Starting { pending } => pending.len(),
            Phase::Ready { .. } => 0,
        };
        self.running.len() + pending
    }

    pub(crate) fn is_available(&self) -> bool {
        self.in_flight() < self.capacity
    }

    pub(crate) fn state(&self) -> WorkerState {
        match self.phase {
            Phase::Starting { .. } => WorkerState::Starting,
            Phase::Ready { .. } => WorkerState::Ready,
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.state() == WorkerState::Ready
    }

    /// How long the worker has had nothing to do, if it is idle.
    pub(crate) fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.idle_since.map(|since| now.saturating_duration_since(since))
    }

    /// Give the worker a task. Caller checks `is_available` first.
    pub(crate) fn assign(&mut self, task: Task, events: &Arc<dyn WorkerEvents>) {
        debug_assert!(self.is_available(), "assign on a full worker");
        self.idle_since = None;
        match &mut self.phase {
            Phase::Starting { pending } => pending.push(task),
            Phase::Ready { executor } => {
                let executor = Arc::clone(executor);
                self.start(task, executor, events);
            }
        }
    }

    /// Executor is up: switch to Ready and start everything that was waiting.
    pub(crate) fn become_ready(
        &mut self,
        executor: Arc<dyn Executor>,
        events: &Arc<dyn WorkerEvents>,
    ) {
        let previous = std::mem::replace(
            &mut self.phase,
            Phase::Ready {
                executor: Arc::clone(&executor),
            },
        );
        if let Phase::Starting { pending } = previous {
            for task in pending {
                self.start(task, Arc::clone(&executor), events);
            }
        }
        self.mark_idle_if_empty();
    }

    /// Tasks that were waiting for an executor that will never come.
    pub(crate) fn into_pending(self) -> Vec<Task> {
        match self.phase {
            Phase::Starting { pending } => pending,
            Phase::Ready { .. } => Vec::new(),
        }
    }

    /// Drop the bookkeeping for a finished task and return its settlement.
    /// `None` if the task is unknown (already settled by a termination).
    pub(crate) fn finish(&mut self, task_id: TaskId) -> Option<Settlement> {
        let running = self.running.remove(&task_id)?;
        self.mark_idle_if_empty();
        Some(running.settlement)
    }

    /// Abort everything. The executor (if any) must still be told to stop.
    pub(crate) fn terminate(self) -> Terminated {
        let mut orphans = Vec::with_capacity(self.in_flight());
        for (_, running) in self.running {
            running.abort.abort();
            orphans.push(running.settlement);
        }
        let executor = match self.phase {
            Phase::Starting { pending } => {
                orphans.extend(pending.into_iter().map(|t| t.into_parts().1));
                None
            }
            Phase::Ready { executor } => Some(executor),
        };
        Terminated { executor, orphans }
    }

    fn mark_idle_if_empty(&mut self) {
        if self.in_flight() == 0 {
            self.idle_since = Some(Instant::now());
        }
    }

    fn start(&mut self, task: Task, executor: Arc<dyn Executor>, events: &Arc<dyn WorkerEvents>) {
        let (envelope, settlement) = task.into_parts();
        let task_id = envelope.task_id();
        let worker_id = self.id;

        // The run gets its own tokio task so an abort or a panic in the
        // executor still produces exactly one report.
        let run = tokio::spawn(async move { executor.run(envelope).await });
        let abort = run.abort_handle();

        let events = Arc::clone(events);
        tokio::spawn(async move {
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => Err(ExecutorError::Failed("executor panicked".into())),
                Err(_) => Err(ExecutorError::Terminated),
            };
            events
                .task_finished(Completion {
                    worker_id,
                    task_id,
                    outcome,
                })
                .await;
        });

        tracing::trace!(%worker_id, %task_id, "task started");
        self.running.insert(task_id, RunningTask { settlement, abort });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PoolError;
    use crate::domain::task::test_task;
    use crate::impls::InProcessExecutorFactory;
    use crate::impls::testing::{Gate, GateHandler, named};
    use tokio::sync::mpsc;

    /// Forwards worker events into channels so tests can drive the worker by hand.
    struct Recorder {
        finished: mpsc::UnboundedSender<Completion>,
        started: mpsc::UnboundedSender<(WorkerId, Result<Arc<dyn Executor>, ExecutorError>)>,
    }

    #[async_trait]
    impl WorkerEvents for Recorder {
        async fn task_finished(self: Arc<Self>, done: Completion) {
            let _ = self.finished.send(done);
        }

        async fn worker_started(
            self: Arc<Self>,
            worker_id: WorkerId,
            started: Result<Arc<dyn Executor>, ExecutorError>,
        ) {
            let _ = self.started.send((worker_id, started));
        }
    }

    struct Harness {
        gate: Arc<Gate>,
        events: Arc<dyn WorkerEvents>,
        finished: mpsc::UnboundedReceiver<Completion>,
        started: mpsc::UnboundedReceiver<(WorkerId, Result<Arc<dyn Executor>, ExecutorError>)>,
        factory: Arc<dyn ExecutorFactory>,
    }

    fn harness() -> Harness {
        let gate = Gate::new();
        let (ftx, frx) = mpsc::unbounded_channel();
        let (stx, srx) = mpsc::unbounded_channel();
        Harness {
            factory: Arc::new(InProcessExecutorFactory::new(GateHandler::new(Arc::clone(&gate)))),
            gate,
            events: Arc::new(Recorder {
                finished: ftx,
                started: stx,
            }),
            finished: frx,
            started: srx,
        }
    }

    #[tokio::test]
    async fn tasks_wait_until_executor_is_ready() {
        let mut h = harness();
        let mut worker = Worker::spawn(2, Arc::clone(&h.factory), &h.events);
        assert_eq!(worker.state(), WorkerState::Starting);

        let (task, _rx) = test_task(named("a"), None);
        let task_id = task.id();
        worker.assign(task, &h.events);
        assert_eq!(worker.in_flight(), 1);
        assert!(worker.is_available());

        let (id, started) = h.started.recv().await.unwrap();
        assert_eq!(id, worker.id());
        worker.become_ready(started.unwrap(), &h.events);
        assert!(worker.is_ready());
        assert_eq!(worker.in_flight(), 1);

        h.gate.finish("a");
        let done = h.finished.recv().await.unwrap();
        assert_eq!(done.task_id, task_id);
        assert_eq!(done.outcome.unwrap(), serde_json::json!("a-done"));

        let settlement = worker.finish(task_id).unwrap();
        settlement.resolve(serde_json::json!(null));
        assert_eq!(worker.in_flight(), 0);
        assert!(worker.idle_for(Instant::now()).is_some());
        assert!(worker.finish(task_id).is_none());
    }

    #[tokio::test]
    async fn capacity_bounds_availability() {
        let h = harness();
        let mut worker = Worker::spawn(1, Arc::clone(&h.factory), &h.events);
        worker.assign(test_task(named("x"), None).0, &h.events);
        assert!(!worker.is_available());
        assert_eq!(worker.capacity(), 1);
    }

    #[tokio::test]
    async fn terminate_returns_every_settlement() {
        let mut h = harness();
        let mut worker = Worker::spawn(3, Arc::clone(&h.factory), &h.events);
        let (_, started) = h.started.recv().await.unwrap();
        worker.become_ready(started.unwrap(), &h.events);

        let (a, rx_a) = test_task(named("a"), None);
        let (b, rx_b) = test_task(named("b"), None);
        worker.assign(a, &h.events);
        worker.assign(b, &h.events);

        let terminated = worker.terminate();
        assert!(terminated.executor.is_some());
        assert_eq!(terminated.orphans.len(), 2);
        for s in terminated.orphans {
            s.reject(PoolError::WorkerTerminated);
        }
        assert_eq!(rx_a.await.unwrap(), Err(PoolError::WorkerTerminated));
        assert_eq!(rx_b.await.unwrap(), Err(PoolError::WorkerTerminated));

        // aborted runs still report once, as terminated
        let done = h.finished.recv().await.unwrap();
        assert_eq!(done.outcome, Err(ExecutorError::Terminated));
    }

    #[tokio::test]
    async fn terminate_while_starting_orphans_pending() {
        let h = harness();
        let mut worker = Worker::spawn(2, Arc::clone(&h.factory), &h.events);
        worker.assign(test_task(named("p"), None).0, &h.events);

        let terminated = worker.terminate();
        assert!(terminated.executor.is_none());
        assert_eq!(terminated.orphans.len(), 1);
    }
}
