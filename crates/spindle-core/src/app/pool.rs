//! Pool - the public handle around the scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant};

use super::builder::{BuildError, PoolBuilder};
use super::config::PoolConfig;
use super::handle::TaskHandle;
use super::reaper_loop::ReaperLoop;
use super::scheduler::{Admission, Scheduler};
use super::status::PoolStatus;
use super::worker::{Completion, WorkerEvents};
use crate::domain::task::Settlement;
use crate::domain::{
    ExecutorError, PoolError, PoolState, Task, TaskEnvelope, TaskId, TaskResult, WorkerId,
};
use crate::ports::{BacklogQueue, Executor, ExecutorFactory};
use crate::typed::{PayloadCodec, TypedTask};

/// State shared between the pool handle, worker background tasks and the
/// reaper. All bookkeeping sits behind one lock.
pub(crate) struct PoolShared {
    scheduler: Mutex<Scheduler>,
    /// Fired after every worker start attempt.
    worker_started: Notify,
    destroyed: Notify,
}

impl PoolShared {
    fn events(self: &Arc<Self>) -> Arc<dyn WorkerEvents> {
        Arc::clone(self) as Arc<dyn WorkerEvents>
    }

    /// One reaper pass. Returns `false` once the pool is shutting down.
    pub(crate) async fn reap_idle(&self, idle_timeout: Duration) -> bool {
        let executors = {
            let mut scheduler = self.scheduler.lock().await;
            if !scheduler.state().accepts_work() {
                return false;
            }
            scheduler.reap_idle(Instant::now(), idle_timeout)
        };
        terminate_all(executors).await;
        true
    }

    /// Second half of teardown, after `begin_destroy`. Terminates `executors`,
    /// then waits for every executor creation still in flight and terminates
    /// what it produced. Ends in `Destroyed`.
    async fn finish_teardown(&self, executors: Vec<Arc<dyn Executor>>) {
        terminate_all(executors).await;
        loop {
            let started = self.worker_started.notified();
            let (late, starting) = {
                let mut scheduler = self.scheduler.lock().await;
                (scheduler.take_late(), scheduler.starting_workers())
            };
            terminate_all(late).await;
            if starting == 0 {
                break;
            }
            tracing::debug!(starting, "waiting for starting workers before teardown completes");
            started.await;
        }
        self.scheduler.lock().await.finish_destroy();
        self.destroyed.notify_waiters();
    }
}

#[async_trait]
impl WorkerEvents for PoolShared {
    async fn task_finished(self: Arc<Self>, done: Completion) {
        let events = self.events();
        let mut scheduler = self.scheduler.lock().await;
        scheduler.task_finished(done, &events);
    }

    async fn worker_started(
        self: Arc<Self>,
        worker_id: WorkerId,
        started: Result<Arc<dyn Executor>, ExecutorError>,
    ) {
        let events = self.events();
        let orphan = {
            let mut scheduler = self.scheduler.lock().await;
            scheduler.worker_started(worker_id, started, &events)
        };
        self.worker_started.notify_waiters();

        if let Some(executor) = orphan {
            tracing::debug!(%worker_id, "worker came up after removal, terminating");
            executor.terminate().await;
        }
    }
}

async fn terminate_all(executors: Vec<Arc<dyn Executor>>) {
    let mut set = JoinSet::new();
    for executor in executors {
        set.spawn(async move { executor.terminate().await });
    }
    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            tracing::warn!(error = %e, "executor terminate panicked");
        }
    }
}

/// A task-execution pool.
///
/// - `submit` makes the admission decision and returns a [`TaskHandle`]
/// - workers are spawned on demand up to `max_workers` and reaped back to
///   `min_workers` after `idle_timeout`
/// - `destroy` settles every outstanding task with `WorkerTerminated`
///
/// # Dropping
/// Always call [`Pool::destroy`] before dropping a `Pool`. Drop only stops
/// the reaper: it never calls `Executor::terminate`, so executor backends
/// (processes, sandboxes) keep running and running tasks are not aborted.
pub struct Pool {
    shared: Arc<PoolShared>,
    config: PoolConfig,
    shutdown_tx: watch::Sender<bool>,
}

impl Pool {
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Called by [`PoolBuilder::build`] with an already validated config.
    pub(crate) async fn start(
        config: PoolConfig,
        backlog: Box<dyn BacklogQueue>,
        factory: Arc<dyn ExecutorFactory>,
    ) -> Result<Self, BuildError> {
        let shared = Arc::new(PoolShared {
            scheduler: Mutex::new(Scheduler::new(config.clone(), backlog, factory)),
            worker_started: Notify::new(),
            destroyed: Notify::new(),
        });
        let events = shared.events();
        shared.scheduler.lock().await.warm_up(&events);

        loop {
            let started = shared.worker_started.notified();
            let progress = shared.scheduler.lock().await.poll_warm_up();
            match progress {
                Ok(true) => break,
                Ok(false) => started.await,
                Err(err) => {
                    let executors = shared
                        .scheduler
                        .lock()
                        .await
                        .begin_destroy()
                        .unwrap_or_default();
                    shared.finish_teardown(executors).await;
                    return Err(BuildError::WarmUp(err));
                }
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        if config.min_workers < config.max_workers {
            ReaperLoop::spawn(&shared, config.idle_timeout(), shutdown_rx);
        }

        tracing::info!(
            min_workers = config.min_workers,
            max_workers = config.max_workers,
            max_backlog = config.max_backlog(),
            concurrency_per_worker = config.concurrency_per_worker,
            "pool ready"
        );
        Ok(Self {
            shared,
            config,
            shutdown_tx,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Admit a task. Backpressure (`QueueAtLimit`, `NoQueueAvailable`) and
    /// `Destroyed` come back here, before anything changed; everything else
    /// is delivered through the handle.
    pub async fn submit(&self, payload: serde_json::Value) -> Result<TaskHandle, PoolError> {
        self.admit(payload, None).await
    }

    /// Like [`Pool::submit`], with metadata for a custom backlog ordering.
    pub async fn submit_with_metadata(
        &self,
        payload: serde_json::Value,
        metadata: serde_json::Value,
    ) -> Result<TaskHandle, PoolError> {
        self.admit(payload, Some(metadata)).await
    }

    async fn admit(
        &self,
        payload: serde_json::Value,
        metadata: Option<serde_json::Value>,
    ) -> Result<TaskHandle, PoolError> {
        let task_id = TaskId::generate();
        let (settlement, rx) = Settlement::channel();
        let task = Task::new(TaskEnvelope::new(task_id, payload, metadata), settlement);

        let events = self.shared.events();
        let admission = {
            let mut scheduler = self.shared.scheduler.lock().await;
            scheduler.admit(task, &events)
        };
        match admission {
            Ok(Admission::Dispatched(worker_id)) => {
                tracing::debug!(%task_id, %worker_id, "task dispatched");
            }
            Ok(Admission::Spawned(worker_id)) => {
                tracing::debug!(%task_id, %worker_id, "task dispatched to new worker");
            }
            Ok(Admission::Queued) => tracing::debug!(%task_id, "task queued"),
            Err(err) => {
                tracing::debug!(%task_id, error = %err, "task rejected");
                return Err(err);
            }
        }
        Ok(TaskHandle::new(task_id, rx))
    }

    /// Submit and wait for the result.
    pub async fn run(&self, payload: serde_json::Value) -> TaskResult {
        self.submit(payload).await?.await
    }

    /// Submit a typed task and decode its output.
    pub async fn run_typed<T: TypedTask>(&self, task: T) -> Result<T::Output, PoolError> {
        let payload = PayloadCodec::encode(&task).map_err(|e| PoolError::Payload(e.to_string()))?;
        let value = self.run(payload).await?;
        PayloadCodec::decode(value).map_err(|e| PoolError::Payload(e.to_string()))
    }

    /// Cancel a task that is still waiting in the backlog. Its handle resolves
    /// to `Cancelled`. Returns `false` if the task is not queued (unknown,
    /// already running or already settled).
    pub async fn cancel(&self, task_id: TaskId) -> bool {
        self.shared.scheduler.lock().await.cancel(task_id)
    }

    pub async fn worker_count(&self) -> usize {
        self.shared.scheduler.lock().await.worker_count()
    }

    pub async fn backlog_size(&self) -> usize {
        self.shared.scheduler.lock().await.backlog_size()
    }

    pub async fn state(&self) -> PoolState {
        self.shared.scheduler.lock().await.state()
    }

    pub async fn status(&self) -> PoolStatus {
        self.shared.scheduler.lock().await.status()
    }

    /// Terminate every worker and settle every running or queued task with
    /// `WorkerTerminated`. Resolves once all executors have stopped,
    /// including ones whose creation was still in flight.
    /// Calling it again (or concurrently) just waits for the first call.
    pub async fn destroy(&self) {
        let _ = self.shutdown_tx.send(true);
        loop {
            let destroyed = self.shared.destroyed.notified();
            let executors = {
                let mut scheduler = self.shared.scheduler.lock().await;
                match scheduler.state() {
                    state if state.is_terminal() => return,
                    PoolState::Destroying => None,
                    _ => scheduler.begin_destroy(),
                }
            };
            let Some(executors) = executors else {
                destroyed.await;
                continue;
            };

            self.shared.finish_teardown(executors).await;
            tracing::info!("pool destroyed");
            return;
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
