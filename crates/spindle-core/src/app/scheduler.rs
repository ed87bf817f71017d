//! Scheduler - the single owner of pool-wide bookkeeping.
//!
//! Every method here is one atomic transition: the pool calls them with the
//! scheduler lock held and never awaits in between. Side effects that need
//! to await (terminating executors) are returned to the caller instead.

use std::sync::Arc;

use tokio::time::{Duration, Instant};

use super::config::PoolConfig;
use super::status::{PoolStatus, WorkerStatus};
use super::worker::{Completion, Worker, WorkerEvents};
use crate::domain::{ExecutorError, PoolError, PoolState, Task, TaskId, WorkerId};
use crate::ports::{BacklogQueue, Executor, ExecutorFactory};

/// Where an admitted task went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Dispatched(WorkerId),
    Spawned(WorkerId),
    Queued,
}

pub(crate) struct Scheduler {
    config: PoolConfig,
    /// Never `Scaling`; that one is derived from worker phases.
    lifecycle: PoolState,
    workers: Vec<Worker>,
    backlog: Box<dyn BacklogQueue>,
    factory: Arc<dyn ExecutorFactory>,
    warmup_error: Option<ExecutorError>,
    /// Executor creations not yet reported through `worker_started`.
    starting: usize,
    /// Executors that came up after their worker was dropped by teardown.
    late: Vec<Arc<dyn Executor>>,
}

impl Scheduler {
    pub(crate) fn new(
        config: PoolConfig,
        backlog: Box<dyn BacklogQueue>,
        factory: Arc<dyn ExecutorFactory>,
    ) -> Self {
        Self {
            config,
            lifecycle: PoolState::Initializing,
            workers: Vec::new(),
            backlog,
            factory,
            warmup_error: None,
            starting: 0,
            late: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> PoolState {
        match self.lifecycle {
            PoolState::Ready if self.workers.iter().any(|w| !w.is_ready()) => PoolState::Scaling,
            other => other,
        }
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn backlog_size(&self) -> usize {
        self.backlog.size()
    }

    // ---------------------------------------------------------------
    // startup
    // ---------------------------------------------------------------

    /// Spawn the pre-warmed workers.
    pub(crate) fn warm_up(&mut self, events: &Arc<dyn WorkerEvents>) {
        for _ in self.workers.len()..self.config.min_workers {
            self.spawn_worker(events);
        }
    }

    /// `Ok(true)` once every pre-warmed worker is ready (the pool moves to
    /// `Ready`), `Ok(false)` while still waiting, `Err` if one of them failed
    /// to start.
    pub(crate) fn poll_warm_up(&mut self) -> Result<bool, ExecutorError> {
        if let Some(err) = self.warmup_error.take() {
            return Err(err);
        }
        let ready = self.workers.iter().filter(|w| w.is_ready()).count();
        if ready < self.config.min_workers {
            return Ok(false);
        }
        if self.lifecycle == PoolState::Initializing {
            self.lifecycle = PoolState::Ready;
        }
        Ok(true)
    }

    // ---------------------------------------------------------------
    // admission
    // ---------------------------------------------------------------

    /// Decide where a new task goes. On `Err` nothing changed and the task is
    /// dropped unsettled; the caller reports the error directly.
    pub(crate) fn admit(
        &mut self,
        task: Task,
        events: &Arc<dyn WorkerEvents>,
    ) -> Result<Admission, PoolError> {
        if !self.lifecycle.accepts_work() {
            return Err(PoolError::Destroyed);
        }

        // 1) free slot on an existing worker
        if let Some(idx) = self.least_loaded_available() {
            let worker = &mut self.workers[idx];
            worker.assign(task, events);
            return Ok(Admission::Dispatched(worker.id()));
        }

        // 2) room to grow
        if self.workers.len() < self.config.max_workers {
            let idx = self.spawn_worker(events);
            let worker = &mut self.workers[idx];
            worker.assign(task, events);
            return Ok(Admission::Spawned(worker.id()));
        }

        // 3..5) backlog or backpressure
        let max_backlog = self.config.max_backlog();
        if max_backlog == 0 {
            return Err(PoolError::NoQueueAvailable);
        }
        if self.backlog.size() >= max_backlog {
            return Err(PoolError::QueueAtLimit { max_backlog });
        }
        self.backlog.push(task);
        Ok(Admission::Queued)
    }

    /// Least-loaded available worker; ties go to the oldest worker.
    fn least_loaded_available(&self) -> Option<usize> {
        self.workers
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_available())
            .min_by_key(|(_, w)| w.in_flight())
            .map(|(idx, _)| idx)
    }

    fn spawn_worker(&mut self, events: &Arc<dyn WorkerEvents>) -> usize {
        let worker = Worker::spawn(
            self.config.concurrency_per_worker,
            Arc::clone(&self.factory),
            events,
        );
        tracing::info!(
            worker_id = %worker.id(),
            worker_count = self.workers.len() + 1,
            "spawning worker"
        );
        self.starting += 1;
        self.workers.push(worker);
        self.workers.len() - 1
    }

    fn position(&self, worker_id: WorkerId) -> Option<usize> {
        self.workers.iter().position(|w| w.id() == worker_id)
    }

    /// Move backlog entries onto free slots (spawning while there is room)
    /// until either side runs out.
    fn pump(&mut self, events: &Arc<dyn WorkerEvents>) {
        while !self.backlog.is_empty() {
            let idx = match self.least_loaded_available() {
                Some(idx) => idx,
                None if self.workers.len() < self.config.max_workers => self.spawn_worker(events),
                None => break,
            };
            let Some(task) = self.backlog.shift() else {
                break;
            };
            tracing::debug!(task_id = %task.id(), worker_id = %self.workers[idx].id(), "dispatching from backlog");
            self.workers[idx].assign(task, events);
        }
    }

    // ---------------------------------------------------------------
    // worker events
    // ---------------------------------------------------------------

    /// A running task finished. Refill the freed slot from the backlog, then
    /// settle the task, all in one step.
    pub(crate) fn task_finished(&mut self, done: Completion, events: &Arc<dyn WorkerEvents>) {
        let Completion {
            worker_id,
            task_id,
            outcome,
        } = done;

        let Some(idx) = self.position(worker_id) else {
            // worker already terminated; its tasks were settled then
            tracing::trace!(%worker_id, %task_id, "completion from removed worker ignored");
            return;
        };
        let Some(settlement) = self.workers[idx].finish(task_id) else {
            tracing::trace!(%worker_id, %task_id, "completion for unknown task ignored");
            return;
        };

        while self.workers[idx].is_available() {
            let Some(next) = self.backlog.shift() else {
                break;
            };
            tracing::debug!(task_id = %next.id(), %worker_id, "dispatching from backlog");
            self.workers[idx].assign(next, events);
        }
        self.pump(events);

        match outcome {
            Ok(value) => settlement.resolve(value),
            Err(err) => {
                tracing::debug!(%worker_id, %task_id, error = %err, "task failed");
                settlement.reject(err.into());
            }
        }
    }

    /// A worker's executor was created (or failed to be).
    ///
    /// Returns an executor that nobody owns anymore (the worker was removed
    /// while starting); the caller must terminate it. During teardown such
    /// executors are kept for `take_late` instead.
    pub(crate) fn worker_started(
        &mut self,
        worker_id: WorkerId,
        started: Result<Arc<dyn Executor>, ExecutorError>,
        events: &Arc<dyn WorkerEvents>,
    ) -> Option<Arc<dyn Executor>> {
        self.starting = self.starting.saturating_sub(1);
        let Some(idx) = self.position(worker_id) else {
            let orphan = started.ok()?;
            if self.lifecycle == PoolState::Destroying {
                tracing::debug!(%worker_id, "worker came up during teardown");
                self.late.push(orphan);
                return None;
            }
            return Some(orphan);
        };

        match started {
            Ok(executor) => {
                tracing::info!(%worker_id, "worker ready");
                self.workers[idx].become_ready(executor, events);
            }
            Err(err) => {
                tracing::warn!(%worker_id, error = %err, "worker failed to start");
                let worker = self.workers.remove(idx);
                let reason = PoolError::WorkerSpawnFailed(err.to_string());
                for task in worker.into_pending() {
                    task.reject(reason.clone());
                }
                if self.lifecycle == PoolState::Initializing {
                    self.warmup_error = Some(err);
                }
                // each retry consumes a backlog task, so this cannot spin
                self.pump(events);
            }
        }
        None
    }

    // ---------------------------------------------------------------
    // cancel / scale-down / teardown
    // ---------------------------------------------------------------

    /// Pull a still-queued task out of the backlog and settle it as cancelled.
    pub(crate) fn cancel(&mut self, task_id: TaskId) -> bool {
        match self.backlog.remove(task_id) {
            Some(task) => {
                tracing::debug!(%task_id, "queued task cancelled");
                task.reject(PoolError::Cancelled);
                true
            }
            None => false,
        }
    }

    /// Remove workers above `min_workers` that have been idle for at least
    /// `idle_timeout`. Busy or starting workers are never touched.
    pub(crate) fn reap_idle(&mut self, now: Instant, idle_timeout: Duration) -> Vec<Arc<dyn Executor>> {
        if self.lifecycle != PoolState::Ready {
            return Vec::new();
        }
        let mut surplus = self.workers.len().saturating_sub(self.config.min_workers);
        let mut reaped = Vec::new();
        let mut idx = 0;
        while idx < self.workers.len() && surplus > 0 {
            let worker = &self.workers[idx];
            let expired = worker.is_ready()
                && worker.in_flight() == 0
                && worker.idle_for(now).is_some_and(|idle| idle >= idle_timeout);
            if !expired {
                idx += 1;
                continue;
            }
            let worker = self.workers.remove(idx);
            tracing::info!(worker_id = %worker.id(), worker_count = self.workers.len(), "reaping idle worker");
            let terminated = worker.terminate();
            debug_assert!(terminated.orphans.is_empty());
            reaped.extend(terminated.executor);
            surplus -= 1;
        }
        reaped
    }

    /// Enter `Destroying`: drop every worker and settle every outstanding
    /// task with `WorkerTerminated`. Returns the executors to stop, or `None`
    /// if teardown had already begun.
    pub(crate) fn begin_destroy(&mut self) -> Option<Vec<Arc<dyn Executor>>> {
        if !self.lifecycle.accepts_work() {
            return None;
        }
        self.lifecycle = PoolState::Destroying;

        let mut executors = Vec::with_capacity(self.workers.len());
        let mut settled = 0usize;
        for worker in self.workers.drain(..) {
            let terminated = worker.terminate();
            settled += terminated.orphans.len();
            for orphan in terminated.orphans {
                orphan.reject(PoolError::WorkerTerminated);
            }
            executors.extend(terminated.executor);
        }
        while let Some(task) = self.backlog.shift() {
            settled += 1;
            task.reject(PoolError::WorkerTerminated);
        }
        tracing::info!(settled, executors = executors.len(), "pool destroying");
        Some(executors)
    }

    /// Executor creations still in flight. Teardown waits for this to hit zero.
    pub(crate) fn starting_workers(&self) -> usize {
        self.starting
    }

    /// Executors that arrived during teardown and still need terminating.
    pub(crate) fn take_late(&mut self) -> Vec<Arc<dyn Executor>> {
        std::mem::take(&mut self.late)
    }

    pub(crate) fn finish_destroy(&mut self) {
        debug_assert_eq!(self.starting, 0);
        debug_assert!(self.late.is_empty());
        self.lifecycle = PoolState::Destroyed;
    }

    pub(crate) fn status(&self) -> PoolStatus {
        let workers: Vec<WorkerStatus> = self
            .workers
            .iter()
            .map(|w| WorkerStatus {
                id: w.id(),
                state: w.state(),
                in_flight: w.in_flight(),
                capacity: w.capacity(),
            })
            .collect();
        PoolStatus {
            state: self.state(),
            worker_count: workers.len(),
            backlog_size: self.backlog.size(),
            max_backlog: self.config.max_backlog(),
            total_capacity: workers.len() * self.config.concurrency_per_worker,
            total_in_flight: workers.iter().map(|w| w.in_flight).sum(),
            workers,
        }
    }
}
