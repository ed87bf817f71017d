//! Status - point-in-time view of the pool.

use serde::{Deserialize, Serialize};

use crate::domain::{PoolState, WorkerId, WorkerState};

/// Snapshot taken under the scheduler lock, so all counts agree with each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub state: PoolState,
    pub worker_count: usize,
    pub backlog_size: usize,
    pub max_backlog: usize,
    /// `worker_count * concurrency_per_worker`
    pub total_capacity: usize,
    pub total_in_flight: usize,
    pub workers: Vec<WorkerStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub id: WorkerId,
    pub state: WorkerState,
    pub in_flight: usize,
    pub capacity: usize,
}

impl PoolStatus {
    /// Slots that could take a task right now without spawning.
    pub fn free_slots(&self) -> usize {
        self.total_capacity.saturating_sub(self.total_in_flight)
    }
}
