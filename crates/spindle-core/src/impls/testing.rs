//! Test doubles: a handler whose tasks finish only when the test says so,
//! and a factory that counts (and can fail) executor creation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::oneshot;

use super::inprocess::{InProcessExecutor, TaskHandler};
use crate::domain::{ExecutorError, TaskEnvelope, WorkerId};
use crate::ports::{Executor, ExecutorFactory};

type Outcome = Result<serde_json::Value, ExecutorError>;

#[derive(Default)]
struct Slot {
    tx: Option<oneshot::Sender<Outcome>>,
    rx: Option<oneshot::Receiver<Outcome>>,
}

impl Slot {
    fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            tx: Some(tx),
            rx: Some(rx),
        }
    }
}

/// Tasks are keyed by `payload["name"]`. Whichever side comes first (the
/// running task or `release`) creates the channel, so release-before-start
/// is fine.
#[derive(Default)]
pub(crate) struct Gate {
    slots: Mutex<HashMap<String, Slot>>,
    started: Mutex<Vec<String>>,
}

impl Gate {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn release(&self, name: &str, outcome: Outcome) {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.entry(name.to_string()).or_insert_with(Slot::new);
        if let Some(tx) = slot.tx.take() {
            let _ = tx.send(outcome);
        }
    }

    pub(crate) fn finish(&self, name: &str) {
        self.release(name, Ok(json!(format!("{name}-done"))));
    }

    pub(crate) fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    fn wait_for(&self, name: &str) -> oneshot::Receiver<Outcome> {
        self.started.lock().unwrap().push(name.to_string());
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.entry(name.to_string()).or_insert_with(Slot::new);
        match slot.rx.take() {
            Some(rx) => rx,
            None => {
                // same name ran twice; hand out a channel that never fires
                let (tx, rx) = oneshot::channel();
                std::mem::forget(tx);
                rx
            }
        }
    }
}

pub(crate) struct GateHandler {
    gate: Arc<Gate>,
}

impl GateHandler {
    pub(crate) fn new(gate: Arc<Gate>) -> Arc<Self> {
        Arc::new(Self { gate })
    }
}

#[async_trait]
impl TaskHandler for GateHandler {
    async fn handle(&self, envelope: &TaskEnvelope) -> Outcome {
        let name = envelope
            .payload()
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let rx = self.gate.wait_for(&name);
        rx.await
            .unwrap_or_else(|_| Err(ExecutorError::Failed("gate dropped".into())))
    }
}

pub(crate) fn named(name: &str) -> serde_json::Value {
    json!({ "name": name })
}

/// Counts creates/terminates; the first `fail_creates` creations fail.
pub(crate) struct TestFactory {
    handler: Arc<dyn TaskHandler>,
    fail_creates: AtomicUsize,
    pub(crate) created: AtomicUsize,
    pub(crate) terminated: Arc<AtomicUsize>,
}

impl TestFactory {
    pub(crate) fn new(handler: Arc<dyn TaskHandler>) -> Arc<Self> {
        Self::failing(handler, 0)
    }

    pub(crate) fn failing(handler: Arc<dyn TaskHandler>, fail_creates: usize) -> Arc<Self> {
        Arc::new(Self {
            handler,
            fail_creates: AtomicUsize::new(fail_creates),
            created: AtomicUsize::new(0),
            terminated: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }
}

struct CountingExecutor {
    inner: InProcessExecutor,
    terminated: Arc<AtomicUsize>,
}

#[async_trait]
impl Executor for CountingExecutor {
    async fn run(&self, envelope: TaskEnvelope) -> Outcome {
        self.inner.run(envelope).await
    }

    async fn terminate(&self) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
        self.inner.terminate().await;
    }
}

#[async_trait]
impl ExecutorFactory for TestFactory {
    async fn create(&self, worker_id: WorkerId) -> Result<Arc<dyn Executor>, ExecutorError> {
        let should_fail = self
            .fail_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ExecutorError::Spawn("test factory refused".into()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CountingExecutor {
            inner: InProcessExecutor::new(worker_id, Arc::clone(&self.handler)),
            terminated: Arc::clone(&self.terminated),
        }))
    }
}
